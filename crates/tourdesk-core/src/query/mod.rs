//! Query orchestration: fetch-on-subscribe, polling, deduplication.

mod config;
pub mod controller;

pub use config::{QueryConfig, DEFAULT_EVICTION_GRACE, DEFAULT_POLL_INTERVAL};
pub use controller::{fetch_payload, Fetcher, PendingFetch, QueryController, QuerySubscription};
