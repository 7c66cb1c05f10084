//! Bulletin discovery on the price index page.
//!
//! The index page lists every published bulletin as a plain anchor. A link
//! counts as a price bulletin when its `href` has the bulletin path shape
//! (an 8-digit `YYYYMMDD` folder followed by a numeric page name) and its
//! text mentions prices or the market. Candidates are ranked by the date in
//! their path, newest first.
//!
//! ```rust
//! use caijia_core::locator::{LinkRules, candidate_links, rank_links};
//!
//! let rules = LinkRules::new(
//!     r"/fgw/jbsj/(\d{8})/\d+\.html",
//!     ["价格"],
//!     "https://www.fengxian.gov.cn",
//! )?;
//! let html = r#"
//! <a href="/fgw/jbsj/20250101/1.html">1月1日价格</a>
//! <a href="/fgw/jbsj/20250516/2.html">5月16日价格</a>
//! "#;
//! let ranked = rank_links(candidate_links(html, &rules));
//! assert_eq!(ranked[0].url, "https://www.fengxian.gov.cn/fgw/jbsj/20250516/2.html");
//! # Ok::<(), caijia_core::Error>(())
//! ```

use crate::config::SourceConfig;
use crate::fetcher::Fetcher;
use crate::{Error, Result};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Fallback date folder lookup when the link pattern has no capture group.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static DATE_FOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/(\d{8})/").unwrap());

/// A price bulletin found on the index page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletinLink {
    /// Absolute bulletin URL.
    pub url: String,
    /// Anchor text.
    pub title: String,
    /// Date parsed from the URL's `YYYYMMDD` folder.
    pub date: Option<NaiveDate>,
}

/// An anchor as found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Raw `href` attribute.
    pub href: String,
    /// Visible text, trimmed.
    pub text: String,
}

/// Which anchors count as bulletins and how to make them absolute.
#[derive(Debug, Clone)]
pub struct LinkRules {
    pattern: Regex,
    keywords: Vec<String>,
    origin: Url,
}

impl LinkRules {
    /// Build rules from a path pattern, title keywords and the site origin.
    pub fn new<I, S>(pattern: &str, keywords: I, origin: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pattern =
            Regex::new(pattern).map_err(|e| Error::Config(format!("Invalid link_pattern: {e}")))?;
        let origin = Url::parse(origin)?;
        Ok(Self {
            pattern,
            keywords: keywords.into_iter().map(Into::into).collect(),
            origin,
        })
    }

    /// Build rules from the source configuration.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(
            &config.link_pattern,
            config.title_keywords.iter().cloned(),
            &config.origin()?,
        )
    }

    /// Whether an anchor points at a price bulletin.
    pub fn accepts(&self, anchor: &Anchor) -> bool {
        self.pattern.is_match(&anchor.href)
            && self.keywords.iter().any(|k| anchor.text.contains(k.as_str()))
    }

    /// Make an `href` absolute against the site origin.
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            Url::parse(href).ok()?
        } else {
            self.origin.join(href).ok()?
        };
        Some(resolved.to_string())
    }

    /// Parse the `YYYYMMDD` folder out of a bulletin URL.
    pub fn date_of(&self, url: &str) -> Option<NaiveDate> {
        let folder = self
            .pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .or_else(|| DATE_FOLDER_RE.captures(url).and_then(|caps| caps.get(1)))?;
        parse_date_folder(folder.as_str())
    }
}

/// Parse an 8-digit `YYYYMMDD` string.
pub fn parse_date_folder(folder: &str) -> Option<NaiveDate> {
    if folder.len() != 8 || !folder.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(folder, "%Y%m%d").ok()
}

/// Every anchor with an `href`, in document order.
pub fn extract_anchors(html: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(Anchor {
                href: href.to_string(),
                text: a.text().collect::<String>().trim().to_string(),
            })
        })
        .collect()
}

/// Bulletin links on an index page, in document order, one per URL.
pub fn candidate_links(html: &str, rules: &LinkRules) -> Vec<BulletinLink> {
    let mut seen = HashSet::new();
    extract_anchors(html)
        .into_iter()
        .filter(|anchor| rules.accepts(anchor))
        .filter_map(|anchor| {
            let url = rules.absolutize(&anchor.href)?;
            seen.insert(url.clone()).then(|| BulletinLink {
                date: rules.date_of(&url),
                url,
                title: anchor.text,
            })
        })
        .collect()
}

/// Sort links newest first.
///
/// Undated links rank as the oldest. The sort is stable, so links with the
/// same date keep their document order.
pub fn rank_links(mut links: Vec<BulletinLink>) -> Vec<BulletinLink> {
    links.sort_by(|a, b| b.date.cmp(&a.date));
    links
}

/// Finds the most recent price bulletin on the configured index page.
#[derive(Clone)]
pub struct Locator {
    fetcher: Fetcher,
    index_url: String,
    rules: LinkRules,
}

impl Locator {
    /// Create a locator for an index page.
    pub fn new(fetcher: Fetcher, index_url: impl Into<String>, rules: LinkRules) -> Self {
        Self {
            fetcher,
            index_url: index_url.into(),
            rules,
        }
    }

    /// Create a locator from the source configuration.
    pub fn from_config(fetcher: Fetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self::new(
            fetcher,
            config.index_url.clone(),
            LinkRules::from_config(config)?,
        ))
    }

    /// The configured index page.
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    /// Fetch the index page and return every bulletin link, newest first.
    pub async fn ranked_links(&self) -> Result<Vec<BulletinLink>> {
        let html = self.fetcher.fetch_html(&self.index_url).await?;
        let links = rank_links(candidate_links(&html, &self.rules));
        debug!("Found {} bulletin links on {}", links.len(), self.index_url);
        Ok(links)
    }

    /// Fetch the index page and return the newest bulletin, or `None` when
    /// the page lists no bulletin.
    pub async fn locate_latest(&self) -> Result<Option<BulletinLink>> {
        let latest = self.ranked_links().await?.into_iter().next();
        match &latest {
            Some(link) => info!("Latest bulletin: {} ({})", link.title, link.url),
            None => info!("No bulletin links on {}", self.index_url),
        }
        Ok(latest)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_LINK_PATTERN;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const ORIGIN: &str = "https://www.fengxian.gov.cn";

    fn rules() -> LinkRules {
        LinkRules::new(DEFAULT_LINK_PATTERN, ["价格", "物价", "市场"], ORIGIN).unwrap()
    }

    fn anchor(href: &str, text: &str) -> Anchor {
        Anchor {
            href: href.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_extracts_anchor_text_through_nested_tags() {
        let html = r#"<ul><li><a href="/a.html" title="x"> <span>5月16日</span>价格 </a></li>
<li><a name="top">no href</a></li></ul>"#;
        let anchors = extract_anchors(html);
        assert_eq!(anchors, vec![anchor("/a.html", "5月16日价格")]);
    }

    #[test]
    fn test_accepts_requires_path_shape_and_keyword() {
        let rules = rules();
        assert!(rules.accepts(&anchor("/fgw/jbsj/20250516/89097.html", "主要农副产品价格")));
        assert!(rules.accepts(&anchor("/fgw/jbsj/20250516/89097.html", "农贸市场行情")));
        assert!(rules.accepts(&anchor("/fgw/jbsj/20250516/89097.html", "物价信息")));
        assert!(!rules.accepts(&anchor("/fgw/jbsj/20250516/89097.html", "工作动态")));
        assert!(!rules.accepts(&anchor("/fgw/jbsj/2025051/89097.html", "价格")));
        assert!(!rules.accepts(&anchor("/fgw/jbsj/20250516/notes.html", "价格")));
        assert!(!rules.accepts(&anchor("/fgw/other/20250516/89097.html", "价格")));
    }

    #[test]
    fn test_absolutize_relative_and_absolute() {
        let rules = rules();
        assert_eq!(
            rules.absolutize("/fgw/jbsj/20250516/89097.html").unwrap(),
            "https://www.fengxian.gov.cn/fgw/jbsj/20250516/89097.html"
        );
        assert_eq!(
            rules.absolutize("fgw/jbsj/20250516/89097.html").unwrap(),
            "https://www.fengxian.gov.cn/fgw/jbsj/20250516/89097.html"
        );
        assert_eq!(
            rules
                .absolutize("http://mirror.example.com/fgw/jbsj/20250516/1.html")
                .unwrap(),
            "http://mirror.example.com/fgw/jbsj/20250516/1.html"
        );
    }

    #[test]
    fn test_date_of_url() {
        let rules = rules();
        assert_eq!(
            rules.date_of("https://www.fengxian.gov.cn/fgw/jbsj/20250516/89097.html"),
            NaiveDate::from_ymd_opt(2025, 5, 16)
        );
        assert_eq!(
            rules.date_of("https://www.fengxian.gov.cn/fgw/jbsj/20251399/1.html"),
            None
        );

        let no_capture = LinkRules::new(r"/jbsj/\d{8}/\d+\.html", ["价格"], ORIGIN).unwrap();
        assert_eq!(
            no_capture.date_of("https://x.cn/jbsj/20240229/1.html"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn test_parse_date_folder() {
        assert_eq!(
            parse_date_folder("20250101"),
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );
        assert_eq!(parse_date_folder("2025011"), None);
        assert_eq!(parse_date_folder("2025O101"), None);
        assert_eq!(parse_date_folder("20250230"), None);
    }

    #[test]
    fn test_latest_date_wins() {
        let html = r#"
<a href="/fgw/jbsj/20250101/1.html">1月1日主要副食品价格</a>
<a href="/fgw/jbsj/20250516/2.html">5月16日主要副食品价格</a>
<a href="/fgw/jbsj/20250301/3.html">3月1日主要副食品价格</a>"#;
        let ranked = rank_links(candidate_links(html, &rules()));
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].url, format!("{ORIGIN}/fgw/jbsj/20250516/2.html"));
        assert_eq!(ranked[0].title, "5月16日主要副食品价格");
        assert_eq!(ranked[1].date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(ranked[2].date, NaiveDate::from_ymd_opt(2025, 1, 1));
    }

    #[test]
    fn test_undated_links_rank_last_and_ties_keep_order() {
        let links = vec![
            BulletinLink {
                url: "u1".into(),
                title: "undated".into(),
                date: None,
            },
            BulletinLink {
                url: "u2".into(),
                title: "first".into(),
                date: NaiveDate::from_ymd_opt(2025, 5, 1),
            },
            BulletinLink {
                url: "u3".into(),
                title: "second".into(),
                date: NaiveDate::from_ymd_opt(2025, 5, 1),
            },
        ];
        let ranked = rank_links(links);
        let order: Vec<&str> = ranked.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(order, vec!["u2", "u3", "u1"]);
    }

    #[test]
    fn test_candidates_are_deduplicated_and_filtered() {
        let html = r#"
<a href="/fgw/jbsj/20250516/2.html">价格</a>
<a href="https://www.fengxian.gov.cn/fgw/jbsj/20250516/2.html">价格（重复）</a>
<a href="/fgw/jbsj/20250516/3.html">通知公告</a>
<a href="/fgw/jbsj/index_2.html">下一页</a>"#;
        let links = candidate_links(html, &rules());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, "价格");
    }

    #[test]
    fn test_from_config() {
        let config = SourceConfig::default();
        let locator = Locator::from_config(Fetcher::new().unwrap(), &config).unwrap();
        assert_eq!(locator.index_url(), config.index_url);
    }

    #[tokio::test]
    async fn test_locate_latest_against_index_page() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let index = r#"<html><body><ul>
<li><a href="/fgw/jbsj/20250101/100.html" target="_blank">1月1日价格信息</a></li>
<li><a href="/fgw/jbsj/20250516/89097.html" target="_blank">5月16日价格信息</a></li>
</ul></body></html>"#;
        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index))
            .mount(&server)
            .await;

        let rules = LinkRules::new(DEFAULT_LINK_PATTERN, ["价格"], &server.uri())?;
        let locator = Locator::new(
            Fetcher::new()?,
            format!("{}/fgw/jbsj/index.html", server.uri()),
            rules,
        );

        let latest = locator.locate_latest().await?.unwrap();
        assert_eq!(
            latest.url,
            format!("{}/fgw/jbsj/20250516/89097.html", server.uri())
        );
        assert_eq!(latest.date, NaiveDate::from_ymd_opt(2025, 5, 16));
        Ok(())
    }

    #[tokio::test]
    async fn test_locate_latest_empty_index() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>维护中</p>"))
            .mount(&server)
            .await;

        let rules = LinkRules::new(DEFAULT_LINK_PATTERN, ["价格"], &server.uri())?;
        let locator = Locator::new(Fetcher::new()?, format!("{}/index.html", server.uri()), rules);
        assert!(locator.locate_latest().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_locate_latest_propagates_fetch_failure() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rules = LinkRules::new(DEFAULT_LINK_PATTERN, ["价格"], &server.uri())?;
        let locator = Locator::new(Fetcher::new()?, format!("{}/index.html", server.uri()), rules);
        match locator.locate_latest().await {
            Err(Error::HttpStatus { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected HttpStatus, got {other:?}"),
        }
        Ok(())
    }
}
