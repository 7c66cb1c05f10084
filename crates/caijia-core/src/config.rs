//! Configuration for the price pipeline.
//!
//! Configuration is stored in TOML format. Every section and field is
//! optional in the file; anything missing falls back to the defaults below.
//! A handful of fields can be overridden from the environment, which is how
//! the assisted-matching API key is normally supplied.
//!
//! ## Resolution Order
//!
//! 1. **Defaults**: [`Config::default`]
//! 2. **Config file**: `<config_dir>/caijia/config.toml` (or an explicit path)
//! 3. **Environment**: `CAIJIA_*` and `OPENAI_*` variables
//!
//! ## Example Configuration File
//!
//! ```toml
//! [source]
//! index_url = "https://www.fengxian.gov.cn/fgw/jbsj/index.html"
//! title_keywords = ["价格", "物价", "市场"]
//! skip_leading_columns = 1
//!
//! [fetch]
//! timeout_secs = 30
//!
//! [assist]
//! enabled = true
//! model = "gpt-4o"
//! ```

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default bulletin index page.
pub const DEFAULT_INDEX_URL: &str = "https://www.fengxian.gov.cn/fgw/jbsj/index.html";

/// Default bulletin path shape. The first capture group is the `YYYYMMDD` folder.
pub const DEFAULT_LINK_PATTERN: &str = r"/fgw/jbsj/(\d{8})/\d+\.html";

/// Default OpenAI-compatible API base URL for assisted matching.
pub const DEFAULT_ASSIST_BASE_URL: &str = "https://api.openai.com/v1";

/// Top-level configuration handed to [`crate::PricePipeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where bulletins are discovered and how their tables are read.
    pub source: SourceConfig,
    /// HTTP client settings.
    pub fetch: FetchConfig,
    /// Assisted text-matching service.
    pub assist: AssistConfig,
}

/// Bulletin source settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Index page listing the published bulletins.
    pub index_url: String,

    /// Site origin prefixed to relative bulletin links.
    ///
    /// Derived from `index_url` when unset.
    pub origin: Option<String>,

    /// Regex an anchor `href` must match to count as a bulletin link.
    ///
    /// The first capture group, when present, must be the `YYYYMMDD` folder.
    pub link_pattern: String,

    /// Anchor text must contain at least one of these keywords.
    pub title_keywords: Vec<String>,

    /// Number of leading cells dropped from every extracted row before matching.
    ///
    /// Bulletin tables open with a serial-number column.
    pub skip_leading_columns: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            origin: None,
            link_pattern: DEFAULT_LINK_PATTERN.to_string(),
            title_keywords: vec!["价格".to_string(), "物价".to_string(), "市场".to_string()],
            skip_leading_columns: 1,
        }
    }
}

impl SourceConfig {
    /// Site origin used to absolutize relative links, without a trailing slash.
    pub fn origin(&self) -> Result<String> {
        if let Some(origin) = &self.origin {
            return Ok(origin.trim_end_matches('/').to_string());
        }
        let index = Url::parse(&self.index_url)?;
        Ok(index.origin().ascii_serialization())
    }

    /// Compile [`Self::link_pattern`].
    pub fn link_regex(&self) -> Result<Regex> {
        Regex::new(&self.link_pattern)
            .map_err(|e| Error::Config(format!("Invalid link_pattern: {e}")))
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("caijia/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    /// Request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Assisted text-matching service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistConfig {
    /// Whether assisted matching is attempted at all.
    pub enabled: bool,
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    /// Chat model used for matching.
    pub model: String,
    /// API key. Normally supplied through `OPENAI_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Completion token limit for one matching call.
    pub max_tokens: u32,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_ASSIST_BASE_URL.to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            max_tokens: 1000,
        }
    }
}

impl AssistConfig {
    /// Assisted matching runs only when enabled and a key is configured.
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Path of the default config file.
    ///
    /// - Linux: `~/.config/caijia/config.toml`
    /// - macOS: `~/Library/Application Support/dev.caijia.caijia/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("dev", "caijia", "caijia")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Takes the lookup as a closure so tests do not touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CAIJIA_INDEX_URL") {
            self.source.index_url = url;
        }
        if let Some(secs) = lookup("CAIJIA_TIMEOUT_SECS").and_then(|s| s.trim().parse().ok()) {
            self.fetch.timeout_secs = secs;
        }
        if let Some(base) = lookup("OPENAI_BASE_URL") {
            self.assist.base_url = base;
        }
        if let Some(model) = lookup("CAIJIA_ASSIST_MODEL") {
            self.assist.model = model;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.assist.api_key = Some(key);
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.source.index_url)
            .map_err(|e| Error::Config(format!("Invalid index_url '{}': {e}", self.source.index_url)))?;
        if let Some(origin) = &self.source.origin {
            Url::parse(origin)
                .map_err(|e| Error::Config(format!("Invalid origin '{origin}': {e}")))?;
        }
        self.source.link_regex()?;
        if self.source.title_keywords.is_empty() {
            return Err(Error::Config("title_keywords must not be empty".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".into()));
        }
        if self.assist.enabled {
            Url::parse(&self.assist.base_url).map_err(|e| {
                Error::Config(format!("Invalid assist base_url '{}': {e}", self.assist.base_url))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::disallowed_macros, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.source.index_url, DEFAULT_INDEX_URL);
        assert_eq!(config.source.title_keywords, vec!["价格", "物价", "市场"]);
        assert_eq!(config.source.skip_leading_columns, 1);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert!(config.fetch.user_agent.starts_with("caijia/"));
        assert!(config.assist.enabled);
        assert!(config.assist.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_origin_derived_from_index_url() -> anyhow::Result<()> {
        let config = Config::default();
        assert_eq!(config.source.origin()?, "https://www.fengxian.gov.cn");

        let mut explicit = SourceConfig::default();
        explicit.origin = Some("http://mirror.example.com/".to_string());
        assert_eq!(explicit.origin()?, "http://mirror.example.com");
        Ok(())
    }

    #[test]
    fn test_partial_toml_uses_defaults() -> anyhow::Result<()> {
        let config: Config = toml::from_str(
            r#"
[source]
skip_leading_columns = 0

[assist]
enabled = false
"#,
        )?;
        assert_eq!(config.source.skip_leading_columns, 0);
        assert_eq!(config.source.index_url, DEFAULT_INDEX_URL);
        assert!(!config.assist.enabled);
        assert_eq!(config.assist.model, "gpt-4o");
        Ok(())
    }

    #[test]
    fn test_load_from_file_roundtrip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.fetch.timeout_secs = 5;
        config.assist.api_key = Some("sk-secret".to_string());
        fs::write(&path, toml::to_string_pretty(&config)?)?;

        let written = fs::read_to_string(&path)?;
        assert!(!written.contains("sk-secret"), "api key must not be persisted");

        let loaded = Config::read_file(&path)?;
        assert_eq!(loaded.fetch.timeout_secs, 5);
        assert_eq!(loaded.assist.api_key, None);
        Ok(())
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[source\nindex_url = ").unwrap();
        match Config::load_from(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to parse config")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CAIJIA_INDEX_URL", "http://127.0.0.1:9000/index.html"),
            ("CAIJIA_TIMEOUT_SECS", "7"),
            ("OPENAI_BASE_URL", "http://127.0.0.1:9001/v1"),
            ("CAIJIA_ASSIST_MODEL", "gpt-4o-mini"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(ToString::to_string));

        assert_eq!(config.source.index_url, "http://127.0.0.1:9000/index.html");
        assert_eq!(config.fetch.timeout_secs, 7);
        assert_eq!(config.assist.base_url, "http://127.0.0.1:9001/v1");
        assert_eq!(config.assist.model, "gpt-4o-mini");
        assert!(config.assist.is_active());
    }

    #[test]
    fn test_unparseable_timeout_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "CAIJIA_TIMEOUT_SECS").then(|| "soon".to_string()));
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_assist_inactive_without_key_or_when_disabled() {
        let mut assist = AssistConfig::default();
        assert!(!assist.is_active());
        assist.api_key = Some("   ".to_string());
        assert!(!assist.is_active());
        assist.api_key = Some("sk-test".to_string());
        assert!(assist.is_active());
        assist.enabled = false;
        assert!(!assist.is_active());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.source.link_pattern = "(unclosed".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.source.index_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.source.title_keywords.clear();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.fetch.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
