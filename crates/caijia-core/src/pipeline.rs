//! The request pipeline: index page → latest bulletin → tables → matches.
//!
//! One request runs its fetches sequentially and shares nothing mutable with
//! other requests, so a single [`PricePipeline`] can serve many concurrent
//! lookups. Errors never escape the public entry points; they are logged and
//! folded into the failure shape of the result.

use crate::assist::ChatCompletionsClient;
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::locator::{BulletinLink, Locator};
use crate::matcher::{AssistedMatcher, find_matches};
use crate::price::attach_headline;
use crate::table::{Table, extract_tables};
use crate::types::{
    BulletinResult, BulletinSnapshot, Outcome, PriceMatch, PriceQueryResult, PriceReport,
};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Message for an empty food item.
pub const MSG_MISSING_FOOD_ITEM: &str = "需要食材名称";
/// Message when the index page lists no bulletin.
pub const MSG_NO_BULLETIN: &str = "未找到价格信息链接";
/// Message for any other failure of a price lookup.
pub const MSG_PRICE_LOOKUP_FAILED: &str = "获取食材价格信息失败";
/// Message for any other failure of a bulletin snapshot.
pub const MSG_BULLETIN_FAILED: &str = "获取食品价格信息失败";

/// Number of ranked links included in a bulletin snapshot.
pub const SNAPSHOT_LINK_LIMIT: usize = 10;

/// Price lookup pipeline over one bulletin source.
#[derive(Clone)]
pub struct PricePipeline {
    locator: Locator,
    fetcher: Fetcher,
    skip_leading_columns: usize,
    assisted: Option<AssistedMatcher>,
}

impl PricePipeline {
    /// Assemble a pipeline from its parts. Assisted matching starts disabled.
    pub const fn new(locator: Locator, fetcher: Fetcher, skip_leading_columns: usize) -> Self {
        Self {
            locator,
            fetcher,
            skip_leading_columns,
            assisted: None,
        }
    }

    /// Build the pipeline described by `config`.
    ///
    /// Assisted matching is wired in when the configuration enables it and
    /// carries an API key.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::from_config(&config.fetch)?;
        let locator = Locator::from_config(fetcher.clone(), &config.source)?;
        let pipeline = Self::new(locator, fetcher, config.source.skip_leading_columns);

        match ChatCompletionsClient::from_config(&config.assist, &config.fetch)? {
            Some(client) => {
                debug!(model = client.model(), "Assisted matching enabled");
                Ok(pipeline.with_assist(AssistedMatcher::new(Arc::new(client))))
            },
            None => Ok(pipeline),
        }
    }

    /// Use `matcher` before falling back to substring matching.
    #[must_use]
    pub fn with_assist(mut self, matcher: AssistedMatcher) -> Self {
        self.assisted = Some(matcher);
        self
    }

    /// Only use substring matching.
    #[must_use]
    pub fn without_assist(mut self) -> Self {
        self.assisted = None;
        self
    }

    /// Whether assisted matching will be attempted.
    pub const fn has_assist(&self) -> bool {
        self.assisted.is_some()
    }

    /// The locator used to find bulletins.
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Look up today's market price of `food_item` in the latest bulletin.
    ///
    /// The query is trimmed first; an empty query fails without any network
    /// access. A bulletin that lists nothing similar is still a success, with
    /// empty `prices`.
    pub async fn get_food_item_price(&self, food_item: &str) -> PriceQueryResult {
        let food_item = food_item.trim();
        if food_item.is_empty() {
            return Outcome::failure(MSG_MISSING_FOOD_ITEM);
        }

        match self.lookup(food_item).await {
            Ok(report) => Outcome::Success(report),
            Err(Error::NoBulletinFound) => {
                warn!("No bulletin listed on {}", self.locator.index_url());
                Outcome::failure(MSG_NO_BULLETIN)
            },
            Err(e) => {
                error!(
                    error = %e,
                    category = e.category(),
                    recoverable = e.is_recoverable(),
                    food_item,
                    "Price lookup failed"
                );
                Outcome::failure(MSG_PRICE_LOOKUP_FAILED)
            },
        }
    }

    /// Fetch the latest bulletin with every table it contains, unmodified.
    pub async fn latest_bulletin(&self) -> BulletinResult {
        match self.snapshot().await {
            Ok(snapshot) => Outcome::Success(snapshot),
            Err(Error::NoBulletinFound) => {
                warn!("No bulletin listed on {}", self.locator.index_url());
                Outcome::failure(MSG_NO_BULLETIN)
            },
            Err(e) => {
                error!(
                    error = %e,
                    category = e.category(),
                    recoverable = e.is_recoverable(),
                    "Bulletin snapshot failed"
                );
                Outcome::failure(MSG_BULLETIN_FAILED)
            },
        }
    }

    async fn lookup(&self, food_item: &str) -> Result<PriceReport> {
        let link = self
            .locator
            .locate_latest()
            .await?
            .ok_or(Error::NoBulletinFound)?;

        let tables: Vec<Table> = self
            .bulletin_tables(&link)
            .await?
            .iter()
            .map(|t| t.without_leading_columns(self.skip_leading_columns))
            .collect();

        let mut prices = self.match_rows(&tables, food_item).await;
        attach_headline(&mut prices);
        info!("{} rows match '{}'", prices.len(), food_item);

        Ok(PriceReport {
            food_item: food_item.to_string(),
            prices,
            price_date: link.date,
            price_source: link.title,
            price_url: link.url,
        })
    }

    async fn snapshot(&self) -> Result<BulletinSnapshot> {
        let mut links = self.locator.ranked_links().await?;
        let latest = links.first().cloned().ok_or(Error::NoBulletinFound)?;
        let tables = self.bulletin_tables(&latest).await?;
        links.truncate(SNAPSHOT_LINK_LIMIT);

        Ok(BulletinSnapshot {
            title: latest.title,
            url: latest.url,
            date: latest.date,
            tables,
            all_links: links,
        })
    }

    async fn bulletin_tables(&self, link: &BulletinLink) -> Result<Vec<Table>> {
        let html = self.fetcher.fetch_html(&link.url).await?;
        let tables = extract_tables(&html);
        debug!("Extracted {} tables from {}", tables.len(), link.url);
        Ok(tables)
    }

    /// Assisted matching first; substring matching on error or no matches.
    async fn match_rows(&self, tables: &[Table], food_item: &str) -> Vec<PriceMatch> {
        if let Some(assisted) = &self.assisted {
            match assisted.find_matches(tables, food_item).await {
                Ok(matches) if !matches.is_empty() => return matches,
                Ok(_) => {
                    warn!(food_item, "Assisted matching found nothing, using substring matching");
                },
                Err(e) => {
                    warn!(error = %e, food_item, "Assisted matching failed, using substring matching");
                },
            }
        }
        find_matches(tables, food_item)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::assist::CompletionService;
    use crate::config::DEFAULT_LINK_PATTERN;
    use crate::locator::LinkRules;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INDEX: &str = r#"<html><body><ul>
<li><a href="/fgw/jbsj/20250101/100.html">1月1日主要农副产品价格</a></li>
<li><a href="/fgw/jbsj/20250516/89097.html">5月16日主要农副产品价格</a></li>
<li><a href="/fgw/jbsj/20250520/90000.html">工作动态</a></li>
</ul></body></html>"#;

    const BULLETIN: &str = r"<html><body>
<table>
<tr><td>序号</td><td>品名</td><td>最高价</td><td>最低价</td><td>均价</td></tr>
<tr><td>1</td><td>西红柿</td><td>6</td><td>2</td><td>4</td></tr>
<tr><td>2</td><td>番茄(精品)</td><td>8</td><td>5</td><td>6.5</td></tr>
<tr><td>3</td><td>黄瓜</td><td>3</td><td>2</td><td>2.5</td></tr>
</table>
</body></html>";

    struct ScriptedService {
        answer: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete_json(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
                .clone()
                .ok_or_else(|| Error::Assist("service unavailable".to_string()))
        }
    }

    fn scripted(answer: Option<&str>) -> Arc<ScriptedService> {
        Arc::new(ScriptedService {
            answer: answer.map(ToString::to_string),
            calls: AtomicUsize::new(0),
        })
    }

    async fn serve(index: &str, bulletin: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/20250516/89097.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(bulletin))
            .mount(&server)
            .await;
        server
    }

    fn pipeline(server: &MockServer) -> PricePipeline {
        let fetcher = Fetcher::new().unwrap();
        let rules =
            LinkRules::new(DEFAULT_LINK_PATTERN, ["价格", "物价", "市场"], &server.uri()).unwrap();
        let locator = Locator::new(
            fetcher.clone(),
            format!("{}/fgw/jbsj/index.html", server.uri()),
            rules,
        );
        PricePipeline::new(locator, fetcher, 1)
    }

    #[tokio::test]
    async fn test_price_lookup_uses_latest_bulletin() {
        let server = serve(INDEX, BULLETIN).await;
        let result = pipeline(&server).get_food_item_price(" 西红柿 ").await;

        let report = result.payload().unwrap();
        assert_eq!(report.food_item, "西红柿");
        assert_eq!(report.price_source, "5月16日主要农副产品价格");
        assert_eq!(
            report.price_url,
            format!("{}/fgw/jbsj/20250516/89097.html", server.uri())
        );
        assert_eq!(report.price_date.unwrap().to_string(), "2025-05-16");

        let names: Vec<&str> = report.prices.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["西红柿", "番茄(精品)"]);
        assert!(!report.prices[0].data.contains_key("序号"));
        assert_eq!(report.prices[0].median_price, Some(2.0));
        assert_eq!(report.prices[1].median_price, None);
    }

    #[tokio::test]
    async fn test_no_match_is_success_with_empty_prices() {
        let server = serve(INDEX, BULLETIN).await;
        let result = pipeline(&server).get_food_item_price("榴莲").await;
        assert!(result.is_success());
        assert!(result.payload().unwrap().prices.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_fails_without_network() {
        let server = MockServer::start().await;
        let result = pipeline(&server).get_food_item_price("   ").await;
        assert_eq!(result.error(), Some(MSG_MISSING_FOOD_ITEM));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_bulletin_link() {
        let server = serve("<html><a href='/about.html'>关于</a></html>", BULLETIN).await;
        let result = pipeline(&server).get_food_item_price("番茄").await;
        assert_eq!(result.error(), Some(MSG_NO_BULLETIN));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_generic_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let result = pipeline(&server).get_food_item_price("番茄").await;
        assert_eq!(result.error(), Some(MSG_PRICE_LOOKUP_FAILED));

        let snapshot = pipeline(&server).latest_bulletin().await;
        assert_eq!(snapshot.error(), Some(MSG_BULLETIN_FAILED));
    }

    #[tokio::test]
    async fn test_bulletin_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/20250516/89097.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let result = pipeline(&server).get_food_item_price("番茄").await;
        assert_eq!(result.error(), Some(MSG_PRICE_LOOKUP_FAILED));
    }

    #[tokio::test]
    async fn test_assist_failure_matches_substring_result() {
        let server = serve(INDEX, BULLETIN).await;
        let plain = pipeline(&server).get_food_item_price("西红柿").await;

        for service in [
            scripted(None),
            scripted(Some("not json")),
            scripted(Some(r#"{"matches":[]}"#)),
            scripted(Some(r#"{"matches":[{"name":"火星番茄","data":{"价格":"999"}}]}"#)),
        ] {
            let assisted = pipeline(&server).with_assist(AssistedMatcher::new(service.clone()));
            assert!(assisted.has_assist());
            let result = assisted.get_food_item_price("西红柿").await;
            assert_eq!(result, plain);
            assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_assist_answer_gets_computed_headline() {
        let server = serve(INDEX, BULLETIN).await;
        let service = scripted(Some(
            r#"{"matches":[{"name":"番茄(精品)","data":{"最高价":"8","最低价":"5","均价":"6.5"},"medianPrice":6.5}]}"#,
        ));
        let result = pipeline(&server)
            .with_assist(AssistedMatcher::new(service))
            .get_food_item_price("西红柿")
            .await;

        let prices = &result.payload().unwrap().prices;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].name, "番茄(精品)");
        assert_eq!(prices[0].median_price, Some(5.0));
    }

    #[tokio::test]
    async fn test_reordered_answer_keeps_bulletin_headline() {
        let server = serve(INDEX, BULLETIN).await;
        let plain = pipeline(&server).get_food_item_price("西红柿").await;
        let service = scripted(Some(
            r#"{"matches":[{"name":"西红柿","data":{"均价":"4","最高价":"6","最低价":"2"}}]}"#,
        ));
        let result = pipeline(&server)
            .with_assist(AssistedMatcher::new(service))
            .get_food_item_price("西红柿")
            .await;

        let assisted = &result.payload().unwrap().prices[0];
        let substring = &plain.payload().unwrap().prices[0];
        assert_eq!(assisted.median_price, Some(2.0));
        assert_eq!(assisted, substring);
    }

    #[tokio::test]
    async fn test_latest_bulletin_snapshot() {
        let server = serve(INDEX, BULLETIN).await;
        let result = pipeline(&server).latest_bulletin().await;
        let snapshot = result.payload().unwrap();

        assert_eq!(snapshot.title, "5月16日主要农副产品价格");
        assert_eq!(snapshot.date.unwrap().to_string(), "2025-05-16");
        assert_eq!(snapshot.tables.len(), 1);
        assert_eq!(snapshot.tables[0].rows()[0][0], "序号");
        assert_eq!(snapshot.all_links.len(), 2);
        assert!(snapshot.all_links[1].url.ends_with("/20250101/100.html"));
    }

    #[tokio::test]
    async fn test_snapshot_links_are_capped() {
        let mut index = String::from("<html><body>");
        for day in 1..=15 {
            index.push_str(&format!(
                "<a href=\"/fgw/jbsj/202503{day:02}/{day}.html\">3月{day}日价格</a>"
            ));
        }
        index.push_str("<a href=\"/fgw/jbsj/20250516/89097.html\">5月16日价格</a></body></html>");
        let server = serve(&index, BULLETIN).await;

        let result = pipeline(&server).latest_bulletin().await;
        let snapshot = result.payload().unwrap();
        assert_eq!(snapshot.all_links.len(), SNAPSHOT_LINK_LIMIT);
        assert!(snapshot.url.ends_with("/20250516/89097.html"));
    }

    #[test]
    fn test_from_config_wires_assist_only_with_key() {
        let mut config = Config::default();
        assert!(!PricePipeline::from_config(&config).unwrap().has_assist());

        config.assist.api_key = Some("sk-test".to_string());
        let pipeline = PricePipeline::from_config(&config).unwrap();
        assert!(pipeline.has_assist());
        assert!(!pipeline.without_assist().has_assist());
    }
}
