//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the Odoo server URL and database, network timeouts, the retry policy,
//! and the last login used.
//!
//! Configuration is stored at `~/.config/onabtp/config.json`. The
//! `ONABTP_URL` and `ONABTP_DATABASE` environment variables override the
//! stored server settings at runtime; `with_env` returns the overridden
//! copy, and only the stored config is ever saved.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::RetryPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "onabtp";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_URL: &str = "https://btp.onaerp.com";
const DEFAULT_DATABASE: &str = "btptst";

/// Environment variable overriding the server URL
pub const ENV_URL: &str = "ONABTP_URL";

/// Environment variable overriding the database name
pub const ENV_DATABASE: &str = "ONABTP_DATABASE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub url: String,
    pub database: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub connectivity_timeout_secs: u64,
    pub internet_probe_url: String,
    pub last_login: Option<String>,
    pub offline_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            connectivity_timeout_secs: 2,
            internet_probe_url: "https://httpbin.org/get".to_string(),
            last_login: None,
            offline_mode: false,
        }
    }
}

impl Config {
    /// Load the stored config, without environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse config file")
    }

    /// Copy with the process environment overrides applied, for this run only
    pub fn with_env(&self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(&self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = self.clone();
        config.apply_env(lookup);
        config
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.trim().is_empty()) {
            self.url = url.trim().to_string();
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database = db.trim().to_string();
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-database cache directory
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(&self.database))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn connectivity_timeout(&self) -> Duration {
        Duration::from_secs(self.connectivity_timeout_secs)
    }

    #[cfg(test)]
    pub(crate) fn for_tests(url: &str) -> Self {
        Self {
            url: url.to_string(),
            request_timeout_secs: 5,
            retry_base_delay_ms: 10,
            connectivity_timeout_secs: 1,
            internet_probe_url: format!("{}/get", url.trim_end_matches('/')),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.url, "https://btp.onaerp.com");
        assert_eq!(config.database, "btptst");
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_URL => Some("https://erp.example.com ".to_string()),
            ENV_DATABASE => Some("prod".to_string()),
            _ => None,
        });
        assert_eq!(config.url, "https://erp.example.com");
        assert_eq!(config.database, "prod");
    }

    #[test]
    fn test_overrides_leave_stored_config_untouched() {
        let stored = Config::default();
        let effective = stored.with_overrides(|key| match key {
            ENV_URL => Some("https://staging.example".to_string()),
            _ => None,
        });
        assert_eq!(effective.url, "https://staging.example");

        let saved = serde_json::to_value(&stored).expect("serialize");
        assert_eq!(saved["url"], DEFAULT_URL);
    }

    #[test]
    fn test_blank_env_ignored() {
        let mut config = Config::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.database, DEFAULT_DATABASE);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"database": "chantier"}"#).expect("parse");
        assert_eq!(config.database, "chantier");
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.max_retries, 3);
    }
}
