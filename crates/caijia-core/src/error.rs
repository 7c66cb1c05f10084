//! Error types and handling for caijia-core operations.
//!
//! Every fallible operation in the pipeline returns [`Result<T>`]. The public
//! entry points on [`crate::PricePipeline`] never hand these errors to their
//! caller: they are logged and folded into the failure shape of
//! [`crate::PriceQueryResult`]. Inside the crate the variants keep enough
//! context (URL, status, reason) for the log line to be useful.
//!
//! ## Error Categories
//!
//! - **Network Errors**: transport failures and non-2xx responses
//! - **Discovery Errors**: no bulletin link on the index page
//! - **Assist Errors**: the text-matching service failed or answered nonsense
//! - **Configuration Errors**: invalid settings or config files
//!
//! ```rust
//! use caijia_core::Error;
//!
//! let err = Error::NoBulletinFound;
//! assert_eq!(err.category(), "not_found");
//! assert!(!err.is_recoverable());
//! ```

use thiserror::Error;

/// The main error type for caijia-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level network failure.
    ///
    /// Covers connection refusals, DNS failures, timeouts and body decoding
    /// errors raised by `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} fetching '{url}'")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// Status code returned by the server.
        status: u16,
    },

    /// Requested resource was not found (HTTP 404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The index page was fetched but listed no price bulletin.
    #[error("No price bulletin link found on the index page")]
    NoBulletinFound,

    /// URL is malformed or cannot be made absolute.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The assisted text-matching service failed.
    ///
    /// Never reaches the caller of the pipeline: the matcher falls back to
    /// deterministic matching when it sees this.
    #[error("Assisted matching failed: {0}")]
    Assist(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl Error {
    /// Check if the error might succeed when the request is repeated.
    ///
    /// The pipeline itself never retries; the flag is logged with each
    /// failure so transient outages stand out.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            Self::Assist(_) => true,
            _ => false,
        }
    }

    /// Get the error category as a string identifier for structured logs.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::HttpStatus { .. } => "network",
            Self::NotFound(_) | Self::NoBulletinFound => "not_found",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Config(_) => "config",
            Self::Assist(_) => "assist",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::unnecessary_wraps
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_error_display_formatting() {
        let cases = vec![
            (
                Error::HttpStatus {
                    url: "https://example.com/index.html".to_string(),
                    status: 503,
                },
                "HTTP 503 fetching 'https://example.com/index.html'",
            ),
            (
                Error::NoBulletinFound,
                "No price bulletin link found on the index page",
            ),
            (
                Error::Assist("empty body".to_string()),
                "Assisted matching failed: empty body",
            ),
            (
                Error::Config("bad pattern".to_string()),
                "Configuration error: bad pattern",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_json_and_url() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(Error::from(json_err).category(), "serialization");

        let url_err = url::Url::parse("not a url").unwrap_err();
        assert_eq!(Error::from(url_err).category(), "invalid_url");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::NoBulletinFound.category(), "not_found");
        assert_eq!(Error::NotFound("x".into()).category(), "not_found");
        assert_eq!(
            Error::HttpStatus {
                url: String::new(),
                status: 500
            }
            .category(),
            "network"
        );
        assert_eq!(Error::Assist("x".into()).category(), "assist");
        assert_eq!(Error::Config("x".into()).category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        let server_error = Error::HttpStatus {
            url: String::new(),
            status: 502,
        };
        let client_error = Error::HttpStatus {
            url: String::new(),
            status: 403,
        };
        assert!(server_error.is_recoverable());
        assert!(!client_error.is_recoverable());
        assert!(Error::Assist("timeout".into()).is_recoverable());
        assert!(!Error::NoBulletinFound.is_recoverable());
        assert!(!Error::Config("x".into()).is_recoverable());
    }

    proptest! {
        #[test]
        fn test_assist_error_with_arbitrary_messages(msg in r".{0,200}") {
            let error = Error::Assist(msg.clone());
            prop_assert_eq!(error.to_string(), format!("Assisted matching failed: {msg}"));
            prop_assert_eq!(error.category(), "assist");
        }
    }
}
