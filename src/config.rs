//! Client configuration.
//!
//! Loaded from `~/.config/clubcache/config.json`, with `CLUBCACHE_*`
//! environment overrides applied on top. A `.env` file is honored when
//! present.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "clubcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Interval between automatic full refreshes, when the timer is started.
const DEFAULT_AUTO_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub resource_cooldown_secs: u64,
    /// TTL of the transport's in-memory GET response cache; 0 disables it.
    pub response_cache_secs: u64,
    pub auto_refresh_secs: u64,
    /// Overrides the platform cache directory when set.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: crate::api::client::DEFAULT_TIMEOUT_SECS,
            resource_cooldown_secs: crate::sync::rate_limit::DEFAULT_COOLDOWN_SECS,
            response_cache_secs: crate::api::client::DEFAULT_RESPONSE_CACHE_SECS,
            auto_refresh_secs: DEFAULT_AUTO_REFRESH_SECS,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env if present; silently ignore when absent
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLUBCACHE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = Self::env_u64("CLUBCACHE_TIMEOUT_SECS") {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = Self::env_u64("CLUBCACHE_COOLDOWN_SECS") {
            self.resource_cooldown_secs = secs;
        }
        if let Some(secs) = Self::env_u64("CLUBCACHE_RESPONSE_CACHE_SECS") {
            self.response_cache_secs = secs;
        }
        if let Some(secs) = Self::env_u64("CLUBCACHE_AUTO_REFRESH_SECS") {
            self.auto_refresh_secs = secs;
        }
        if let Ok(dir) = std::env::var("CLUBCACHE_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    fn env_u64(name: &str) -> Option<u64> {
        std::env::var(name).ok()?.parse().ok()
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resource_cooldown(&self) -> Duration {
        Duration::from_secs(self.resource_cooldown_secs)
    }

    pub fn response_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.response_cache_secs)
    }

    pub fn auto_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.resource_cooldown(), Duration::from_secs(5));
        assert_eq!(config.response_cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.auto_refresh_interval(), Duration::from_secs(30));
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"base_url": "https://club.example.org"}"#).expect("parse");
        assert_eq!(config.base_url, "https://club.example.org");
        assert_eq!(config.resource_cooldown_secs, 5);
    }

    #[test]
    fn test_explicit_cache_dir_wins() {
        let config = Config {
            cache_dir: Some(PathBuf::from("/tmp/club-test")),
            ..Config::default()
        };
        assert_eq!(config.cache_dir().expect("dir"), PathBuf::from("/tmp/club-test"));
    }
}
