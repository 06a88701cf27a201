use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorInfo, SyncError};

/// Identifies one cached resource collection. Equal keys address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key built from several segments, e.g. `["tour-packages", id]`.
    pub fn compound<S: AsRef<str>>(segments: &[S]) -> Self {
        let joined: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
        Self(joined.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Loading,
    Success,
    Error,
}

/// Identifies one request issued for a key. Later requests get larger values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub(crate) u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of one cache slot.
///
/// `data` always holds something: the placeholder until the first success,
/// then the latest applied payload. An `Error` status keeps the previous data.
pub struct CacheEntry<T: ?Sized> {
    pub key: CacheKey,
    pub data: Arc<T>,
    pub status: Status,
    pub is_stale: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub error: Option<ErrorInfo>,
    pub subscriber_count: usize,
}

pub(crate) type RawEntry = CacheEntry<dyn Any + Send + Sync>;

impl<T: ?Sized> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: Arc::clone(&self.data),
            status: self.status,
            is_stale: self.is_stale,
            last_fetched_at: self.last_fetched_at,
            error: self.error.clone(),
            subscriber_count: self.subscriber_count,
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for CacheEntry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("status", &self.status)
            .field("is_stale", &self.is_stale)
            .field("last_fetched_at", &self.last_fetched_at)
            .field("error", &self.error)
            .field("subscriber_count", &self.subscriber_count)
            .finish()
    }
}

impl<T: ?Sized> CacheEntry<T> {
    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Whether a newly mounted consumer should trigger a fetch.
    ///
    /// True when nothing was ever fetched, the entry was invalidated, or the
    /// last fetch is at least `stale_time` old.
    pub fn needs_fetch(&self, stale_time: Duration) -> bool {
        if self.is_stale {
            return true;
        }
        match self.last_fetched_at {
            None => self.status != Status::Loading,
            Some(at) => {
                let age = (Utc::now() - at).to_std().unwrap_or(Duration::ZERO);
                age >= stale_time
            }
        }
    }
}

impl RawEntry {
    pub(crate) fn downcast<T: Any + Send + Sync>(self) -> Result<CacheEntry<T>, SyncError> {
        let CacheEntry {
            key,
            data,
            status,
            is_stale,
            last_fetched_at,
            error,
            subscriber_count,
        } = self;
        match data.downcast::<T>() {
            Ok(data) => Ok(CacheEntry {
                key,
                data,
                status,
                is_stale,
                last_fetched_at,
                error,
                subscriber_count,
            }),
            Err(_) => Err(SyncError::TypeMismatch(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data: Arc<dyn Any + Send + Sync>) -> RawEntry {
        CacheEntry {
            key: CacheKey::from("cars"),
            data,
            status: Status::Idle,
            is_stale: false,
            last_fetched_at: None,
            error: None,
            subscriber_count: 0,
        }
    }

    #[test]
    fn test_compound_key() {
        let key = CacheKey::compound(&["tour-packages", "42"]);
        assert_eq!(key.as_str(), "tour-packages/42");
        assert_eq!(key, CacheKey::from("tour-packages/42"));
    }

    #[test]
    fn test_downcast() {
        let entry = raw(Arc::new(vec![1u32, 2, 3]));
        let typed = entry.clone().downcast::<Vec<u32>>().expect("same type");
        assert_eq!(*typed.data, vec![1, 2, 3]);

        let err = entry.downcast::<String>().expect_err("different type");
        assert!(matches!(err, SyncError::TypeMismatch(key) if key == "cars"));
    }

    #[test]
    fn test_needs_fetch() {
        let mut entry = raw(Arc::new(()));
        assert!(entry.needs_fetch(Duration::from_secs(60)));

        entry.status = Status::Success;
        entry.last_fetched_at = Some(Utc::now());
        assert!(!entry.needs_fetch(Duration::from_secs(60)));
        assert!(entry.needs_fetch(Duration::ZERO));

        entry.is_stale = true;
        assert!(entry.needs_fetch(Duration::from_secs(60)));

        entry.is_stale = false;
        entry.last_fetched_at = Some(Utc::now() - chrono::Duration::minutes(2));
        assert!(entry.needs_fetch(Duration::from_secs(60)));
    }
}
