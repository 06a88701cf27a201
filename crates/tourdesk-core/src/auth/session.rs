use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::ResourceStore;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Token lifetime issued by the admin API.
const TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionData")
            .field("token", &"[REDACTED]")
            .field("phone_number", &self.phone_number)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl SessionData {
    pub fn new(token: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            phone_number: phone_number.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(TOKEN_EXPIRY_HOURS)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at() - Utc::now()).num_minutes().max(0)
    }
}

#[derive(Debug)]
pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns `false` when there is none or it expired.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .context("Failed to read session file")?;
            let data: SessionData = serde_json::from_str(&contents)
                .context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
            debug!(created_at = %data.created_at, "Stored session expired");
        }
        Ok(false)
    }

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

    /// Forget the session and delete its file.
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Clear the session and drop every cached collection.
    pub fn logout(&mut self, store: &ResourceStore) -> Result<()> {
        self.clear()?;
        store.clear();
        info!("Logged out");
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if session is valid
    pub fn token(&self) -> Option<&str> {
        self.data
            .as_ref()
            .filter(|d| !d.is_expired())
            .map(|d| d.token.as_str())
    }

    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryConfig;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(SessionData::new("tok-123", "+256700000001"));
        session.save().expect("save");

        let mut restored = Session::new(dir.path().to_path_buf());
        assert!(restored.load().expect("load"));
        assert_eq!(restored.token(), Some("tok-123"));
    }

    #[test]
    fn test_expired_session_not_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = Session::new(dir.path().to_path_buf());
        session.update(SessionData {
            token: "old".to_string(),
            phone_number: "+256700000001".to_string(),
            created_at: Utc::now() - Duration::hours(25),
        });
        session.save().expect("save");
        assert!(!session.is_valid());
        assert_eq!(session.token(), None);

        let mut restored = Session::new(dir.path().to_path_buf());
        assert!(!restored.load().expect("load"));
        assert!(restored.data.is_none());
    }

    #[test]
    fn test_logout_clears_file_and_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ResourceStore::new(&QueryConfig::default());
        store.get_or_create::<Vec<String>>(&"cars".into()).expect("slot");

        let mut session = Session::new(dir.path().to_path_buf());
        session.update(SessionData::new("tok", "+256700000001"));
        session.save().expect("save");

        session.logout(&store).expect("logout");
        assert!(!dir.path().join(SESSION_FILE).exists());
        assert!(!store.contains(&"cars".into()));
        assert!(!session.is_valid());
    }

    #[test]
    fn test_debug_hides_token() {
        let data = SessionData::new("secret-token", "+256700000001");
        assert!(!format!("{data:?}").contains("secret-token"));
        assert!(data.minutes_until_expiry() > 23 * 60);
    }
}
