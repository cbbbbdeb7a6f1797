//! Runtime configuration loaded from `~/.config/reelfetch/config.toml`.
//!
//! ```toml
//! registry_url = "https://example.org/providers.json"
//! cache_ttl_secs = 300
//! fetch_timeout_secs = 12
//! chain_deadline_secs = 45
//! max_concurrent_resolutions = 4
//! politeness_delay_ms = 500
//!
//! [[api_keys]]
//! key = "demo-key"
//! requests_used = 10
//! requests_limit = 1000
//! ```
//!
//! Every field is optional; a missing file yields [`Config::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable overriding [`Config::registry_url`].
pub const REGISTRY_URL_ENV: &str = "REELFETCH_REGISTRY_URL";

/// An API key known to the bundled in-memory quota collaborator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ApiKeyConfig {
    pub key: String,
    #[serde(default)]
    pub requests_used: u64,
    pub requests_limit: u64,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote providers document (`http(s)://`) or a local JSON file path.
    pub registry_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Overall budget for one resolution chain, across all hops.
    pub chain_deadline_secs: u64,
    pub max_concurrent_resolutions: usize,
    /// Pause between sequential requests to the same host.
    pub politeness_delay_ms: u64,
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: None,
            cache_ttl_secs: 300,
            fetch_timeout_secs: 12,
            connect_timeout_secs: 8,
            chain_deadline_secs: 45,
            max_concurrent_resolutions: 4,
            politeness_delay_ms: 500,
            api_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Ok(url) = std::env::var(REGISTRY_URL_ENV) {
            if !url.trim().is_empty() {
                config.registry_url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_resolutions == 0 {
            return Err(Error::Config(
                "max_concurrent_resolutions must be at least 1".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 || self.chain_deadline_secs == 0 {
            return Err(Error::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn chain_deadline(&self) -> Duration {
        Duration::from_secs(self.chain_deadline_secs)
    }

    #[must_use]
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.politeness_delay_ms)
    }
}

/// Return the path to the default config file.
#[must_use]
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reelfetch")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.max_concurrent_resolutions, 4);
        assert!(config.registry_url.is_none());
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
registry_url = "https://registry.example/providers.json"
cache_ttl_secs = 60
fetch_timeout_secs = 10
chain_deadline_secs = 30
politeness_delay_ms = 250

[[api_keys]]
key = "abc"
requests_used = 3
requests_limit = 100
"#;
        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(
            config.registry_url.as_deref(),
            Some("https://registry.example/providers.json")
        );
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.chain_deadline(), Duration::from_secs(30));
        assert_eq!(config.politeness_delay(), Duration::from_millis(250));
        assert_eq!(config.api_keys.len(), 1);
        assert_eq!(config.api_keys[0].requests_used, 3);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let config = Config::from_toml_str("max_concurrent_resolutions = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = Config::from_toml_str("cache_ttl_secs = \"soon\"").unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn explicit_missing_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/reelfetch.toml")));
        assert!(result.is_err());
    }
}
