//! Application configuration management.
//!
//! Configuration is stored at `~/.config/tourdesk/config.json`. Environment
//! variables (optionally from a `.env` file) override the stored values:
//!
//! - `TOURDESK_API_URL`: base URL of the REST backend
//! - `TOURDESK_POLL_INTERVAL_MS`: collection polling period, `0` disables polling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::client::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::query::{QueryConfig, DEFAULT_EVICTION_GRACE, DEFAULT_POLL_INTERVAL};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tourdesk";

const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "TOURDESK_API_URL";
const ENV_POLL_INTERVAL: &str = "TOURDESK_POLL_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: u64,
    pub eviction_grace_ms: u64,
    pub request_timeout_secs: u64,
    pub last_phone_number: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            eviction_grace_ms: DEFAULT_EVICTION_GRACE.as_millis() as u64,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_phone_number: None,
        }
    }
}

impl Config {
    /// Load the stored config and apply environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from `lookup`, usually the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = Some(url);
        }
        if let Some(raw) = lookup(ENV_POLL_INTERVAL) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.poll_interval_ms = ms,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid poll interval"),
            }
        }
    }

    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timing settings for collection queries.
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::default()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_eviction_grace(Duration::from_millis(self.eviction_grace_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        let query = config.query_config();
        assert_eq!(query.poll_interval, Duration::from_secs(10));
        assert_eq!(query.eviction_grace, Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            api_base_url: Some("https://api.example.test".to_string()),
            poll_interval_ms: 2500,
            last_phone_number: Some("+256700000001".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save");

        assert_eq!(Config::load_from(&path).expect("load"), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"poll_interval_ms": 0}"#).expect("write");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.poll_interval_ms, 0);
        assert_eq!(config.eviction_grace_ms, 300_000);
        assert!(config.query_config().poll_interval.is_zero());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "http://localhost:4000"),
            (ENV_POLL_INTERVAL, "500"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_base_url(), "http://localhost:4000");
        assert_eq!(config.query_config().poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_poll_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == ENV_POLL_INTERVAL).then(|| "soon".to_string()));
        assert_eq!(config.poll_interval_ms, 10_000);
    }
}
