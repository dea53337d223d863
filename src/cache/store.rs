//! Durable last-known-good cache.
//!
//! One JSON file per resource under the cache directory. Entries are only
//! ever written whole, after a successful fetch; corrupt or missing files
//! are a cache miss, never an error surfaced to the caller.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::Resource;

/// Consider an entry stale after this many minutes. Staleness is reporting
/// only - readers are served the entry either way.
const CACHE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Covers clock skew too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("Failed to create cache directory {}", cache_dir.display())
        })?;
        Ok(Self { cache_dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Load one entry; missing or unreadable entries return `None`.
    pub fn load(&self, key: &str) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(key, error = %e, "Failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Corrupt cache entry, treating as absent");
                None
            }
        }
    }

    /// Write one entry, best-effort. A failed write must not fail the fetch
    /// that produced the value, so this returns a bool rather than an error.
    pub fn save(&self, key: &str, data: &Value) -> bool {
        let entry = CacheEntry::new(data.clone());
        let contents = match serde_json::to_string(&entry) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };

        match std::fs::write(self.entry_path(key), contents) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to write cache entry");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(key, error = %e, "Failed to remove cache entry");
            }
        }
    }

    /// Remove every tracked resource entry.
    pub fn clear(&self) {
        for resource in Resource::ALL {
            self.remove(resource.key());
        }
    }
}
