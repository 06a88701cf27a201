//! Tourdesk core library.
//!
//! The client-side synchronization layer of the tourdesk admin panel: it
//! fetches and polls resource collections from the REST backend, caches them
//! by key, submits create mutations (including multipart photo uploads), and
//! invalidates the cache when a mutation settles.
//!
//! - [`cache`]: the `ResourceStore` with per-key subscribers and generation guards
//! - [`query`]: `QueryController` for fetch-on-subscribe, polling, and deduplication
//! - [`mutation`]: request encoding tables and the `MutationController`
//! - [`api`]: the `Transport` seam and its `reqwest` implementation
//! - [`models`]: cars, destinations, tour packages, staff
//! - [`desk`]: `TourDesk`, wiring everything together

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod desk;
pub mod envelope;
pub mod error;
pub mod models;
pub mod mutation;
pub mod query;

pub use api::{ApiClient, Transport, TransportError};
pub use auth::{Session, SessionData};
pub use cache::{CacheEntry, CacheKey, ResourceStore, Status, Subscription};
pub use config::Config;
pub use desk::TourDesk;
pub use envelope::Envelope;
pub use error::{DecodeError, ErrorInfo, ErrorKind, SyncError, ValidationError};
pub use models::filter_by_name;
pub use mutation::{Attachment, EncodedBody, Mutation, MutationController, MutationRequest, MutationState};
pub use query::{QueryConfig, QueryController, QuerySubscription};
