use std::time::Duration;

/// Poll interval used for every resource collection.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How long an unsubscribed entry is retained before eviction.
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(5 * 60);

/// Runtime behavior of queries and the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Fixed refetch interval while a key has subscribers. Polling does not
    /// back off on errors.
    pub poll_interval: Duration,

    /// How long fetched data counts as fresh when a new subscriber attaches.
    ///
    /// Zero means any cached data is refetched on mount (and shown meanwhile).
    pub stale_time: Duration,

    /// How long an entry with no subscribers is kept before it is evicted.
    /// Zero evicts as soon as the last subscription is released.
    pub eviction_grace: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            stale_time: Duration::ZERO,
            eviction_grace: DEFAULT_EVICTION_GRACE,
        }
    }
}

impl QueryConfig {
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub const fn with_eviction_grace(mut self, eviction_grace: Duration) -> Self {
        self.eviction_grace = eviction_grace;
        self
    }
}
