//! Durable bearer-token session.
//!
//! The token lives in memory on the transport client for the process
//! lifetime and is mirrored here (`session.json` under the cache dir) so a
//! restart picks it up. There is no client-side expiry clock: the server's
//! explicit invalidity signal is authoritative, and a local timer would
//! reintroduce the purge-on-transient-blip race.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in the cache directory
const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

pub struct AuthSession {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl AuthSession {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether one was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents =
                std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;
            self.data = Some(data);
            return Ok(true);
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Drop the session from memory and disk
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = AuthSession::new(dir.path().to_path_buf());
        assert!(!session.load().expect("load empty"));
        assert_eq!(session.token(), None);

        session.update(SessionData {
            token: "tok-123".to_string(),
            username: "admin".to_string(),
            created_at: Utc::now(),
        });
        session.save().expect("save");

        let mut reloaded = AuthSession::new(dir.path().to_path_buf());
        assert!(reloaded.load().expect("load"));
        assert_eq!(reloaded.token(), Some("tok-123"));

        reloaded.clear().expect("clear");
        assert_eq!(reloaded.token(), None);

        let mut after_clear = AuthSession::new(dir.path().to_path_buf());
        assert!(!after_clear.load().expect("load after clear"));
    }
}
