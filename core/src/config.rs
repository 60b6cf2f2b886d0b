//! Connection settings.
//!
//! Settings come from code, from a TOML document, or from `PPMS_*`
//! environment variables. An empty `api_key` selects cache-only mode, an
//! empty `cache_path` disables caching; the gateway refuses a configuration
//! that leaves it with neither.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PpmsError, Result};

const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default)]
    pub cache_path: String,
    #[serde(default)]
    pub cache_only_action: Option<String>,
}

fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

impl ConnectionConfig {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_path: String::new(),
            cache_only_action: None,
        }
    }

    pub fn with_cache(mut self, path: impl AsRef<Path>) -> Self {
        self.cache_path = path.as_ref().to_string_lossy().into_owned();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    pub fn with_cache_only_action(mut self, action: &str) -> Self {
        self.cache_only_action = Some(action.to_string());
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PpmsError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PpmsError::Configuration(format!("reading {} failed: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Read `PPMS_URL`, `PPMS_API_KEY`, `PPMS_TIMEOUT`, `PPMS_CACHE_PATH` and
    /// `PPMS_CACHE_ONLY_ACTION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let url = lookup("PPMS_URL")
            .ok_or_else(|| PpmsError::Configuration("PPMS_URL is not set".to_string()))?;
        let mut config = Self::new(&url, &lookup("PPMS_API_KEY").unwrap_or_default());
        if let Some(timeout) = lookup("PPMS_TIMEOUT") {
            config.timeout_secs = timeout.trim().parse().map_err(|e| {
                PpmsError::Configuration(format!("PPMS_TIMEOUT {timeout:?} is not a number: {e}"))
            })?;
        }
        config.cache_path = lookup("PPMS_CACHE_PATH").unwrap_or_default();
        config.cache_only_action = lookup("PPMS_CACHE_ONLY_ACTION").filter(|a| !a.is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(PpmsError::Configuration(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    /// The cache root, `None` when caching is disabled.
    pub fn cache_root(&self) -> Option<PathBuf> {
        if self.cache_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.cache_path))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn toml_with_defaults() {
        let config = ConnectionConfig::from_toml_str(r#"url = "https://ppms.example/pumapi/""#).unwrap();
        assert_eq!(config.url, "https://ppms.example/pumapi/");
        assert_eq!(config.api_key, "");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.cache_root().is_none());
        assert!(config.cache_only_action.is_none());
    }

    #[test]
    fn toml_full() {
        let text = r#"
            url = "https://ppms.example/pumapi/"
            api_key = "k3y"
            timeout_secs = 2.5
            cache_path = "/tmp/ppms-cache"
            cache_only_action = "getuser"
        "#;
        let config = ConnectionConfig::from_toml_str(text).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.cache_root(), Some(PathBuf::from("/tmp/ppms-cache")));
        assert_eq!(config.cache_only_action.as_deref(), Some("getuser"));
    }

    #[test]
    fn toml_rejects_unknown_keys_and_bad_timeout() {
        let err = ConnectionConfig::from_toml_str("url = \"u\"\napikey = \"k\"").unwrap_err();
        assert!(matches!(err, PpmsError::Configuration(_)));
        let err = ConnectionConfig::from_toml_str("url = \"u\"\ntimeout_secs = 0.0").unwrap_err();
        assert!(matches!(err, PpmsError::Configuration(_)));
    }

    #[test]
    fn env_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PPMS_URL", "http://localhost:3000/"),
            ("PPMS_TIMEOUT", "3"),
            ("PPMS_CACHE_PATH", "cache"),
            ("PPMS_CACHE_ONLY_ACTION", ""),
        ]
        .into_iter()
        .collect();
        let config = ConnectionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.api_key, "");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.cache_root(), Some(PathBuf::from("cache")));
        assert!(config.cache_only_action.is_none());

        let err = ConnectionConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, PpmsError::Configuration(_)));
    }

    #[test]
    fn builder_helpers() {
        let config = ConnectionConfig::new("u", "k")
            .with_cache("/var/cache/ppms")
            .with_timeout(Duration::from_secs(30))
            .with_cache_only_action("getusers");
        assert_eq!(config.cache_root(), Some(PathBuf::from("/var/cache/ppms")));
        assert_eq!(config.timeout_secs, 30.0);
        assert_eq!(config.cache_only_action.as_deref(), Some("getusers"));
    }
}
