use crate::config::FetchConfig;
use crate::{Error, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// HTTP client for fetching bulletin index and bulletin pages.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a new fetcher with the default fetch settings.
    pub fn new() -> Result<Self> {
        Self::from_config(&FetchConfig::default())
    }

    /// Creates a fetcher from configuration.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::build(config.timeout(), &config.user_agent)
    }

    /// Creates a new fetcher with a custom request timeout (primarily for tests)
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(timeout, &FetchConfig::default().user_agent)
    }

    fn build(timeout: Duration, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.5"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Fetches a page and returns its body as text.
    ///
    /// Any non-2xx status is an error; 404 maps to [`Error::NotFound`], every
    /// other failure status to [`Error::HttpStatus`].
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!("Page not found at '{url}'")));
            }
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content = response.text().await?;
        info!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }
}

// Note: Default is not implemented as Fetcher::new() can fail.

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::match_wildcard_for_single_variants
)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header_exists, method, path},
    };

    #[tokio::test]
    async fn test_fetcher_creation() {
        assert!(Fetcher::new().is_ok(), "Fetcher creation should succeed");
        let config = FetchConfig {
            timeout_secs: 3,
            user_agent: "caijia-test".to_string(),
        };
        assert!(Fetcher::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_html_success() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        let body = "<html><body><table><tr><td>青菜</td></tr></table></body></html>";

        Mock::given(method("GET"))
            .and(path("/fgw/jbsj/index.html"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new()?;
        let url = format!("{}/fgw/jbsj/index.html", mock_server.uri());
        let content = fetcher.fetch_html(&url).await?;
        assert_eq!(content, body);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_404_error() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new()?;
        let url = format!("{}/missing.html", mock_server.uri());

        match fetcher.fetch_html(&url).await {
            Err(Error::NotFound(msg)) => assert!(msg.contains("missing.html")),
            Err(e) => panic!("Expected NotFound error, got: {e}"),
            Ok(_) => panic!("Expected error for 404 response"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_500_error() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/error.html"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new()?;
        let url = format!("{}/error.html", mock_server.uri());

        match fetcher.fetch_html(&url).await {
            Err(Error::HttpStatus { status, url: failed }) => {
                assert_eq!(status, 500);
                assert_eq!(failed, url);
            },
            Err(e) => panic!("Expected HttpStatus error, got: {e}"),
            Ok(_) => panic!("Expected error for 500 response"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_timeout() -> anyhow::Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_millis(100))?;
        let url = format!("{}/slow.html", mock_server.uri());

        let result = fetcher.fetch_html(&url).await;
        match result {
            Err(Error::Network(e)) => assert!(e.is_timeout()),
            other => panic!("Expected timeout, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_url() -> anyhow::Result<()> {
        let fetcher = Fetcher::new()?;
        for invalid in ["not-a-url", "", "https://"] {
            assert!(
                fetcher.fetch_html(invalid).await.is_err(),
                "Invalid URL '{invalid}' should fail"
            );
        }
        Ok(())
    }
}
