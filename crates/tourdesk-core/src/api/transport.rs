//! Transport abstraction consumed by the query and mutation controllers.
//!
//! The controllers never talk to `reqwest` directly; they go through this
//! trait so tests can substitute an in-memory implementation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::mutation::EncodedBody;

use super::TransportError;

/// Performs authenticated HTTP calls and returns the raw response body.
///
/// Implementations must return `Err` for every non-2xx status.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET <path>`
    async fn get(&self, path: &str) -> Result<Bytes, TransportError>;

    /// `POST <path>` with a JSON or multipart body.
    async fn post(&self, path: &str, body: EncodedBody) -> Result<Bytes, TransportError>;
}
