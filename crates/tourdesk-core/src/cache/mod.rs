//! In-memory resource cache.
//!
//! This module provides the `ResourceStore` holding one slot per
//! `CacheKey`. Each slot carries the latest data, its fetch status and any
//! error, and a list of subscribers notified on every change. Results are
//! applied in request-generation order; a superseded response is dropped.
//!
//! Slots are created lazily on first use and evicted once the last
//! subscription has been released for the configured grace period.

pub mod entry;
pub mod store;

pub use entry::{CacheEntry, CacheKey, Generation, Status};
pub use store::{ResourceStore, Subscription};

pub(crate) use store::Refetch;
