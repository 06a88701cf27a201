//! Create-mutation execution.
//!
//! A mutation is encoded, posted, and decoded; once it settles, every target
//! key is invalidated whether it succeeded or failed. Nothing is retried.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::api::Transport;
use crate::cache::{CacheKey, ResourceStore};
use crate::envelope::{self, Envelope};
use crate::error::{ErrorInfo, SyncError};

use super::encoding::{self, EncodedBody, EncodingTable, Payload};

/// One write operation and the cache keys it makes stale.
#[derive(Debug, Clone)]
pub struct MutationRequest {
    pub path: String,
    pub table: EncodingTable,
    pub payload: Payload,
    pub target_keys: BTreeSet<CacheKey>,
}

impl MutationRequest {
    pub fn new(path: impl Into<String>, table: EncodingTable, payload: Payload) -> Self {
        Self {
            path: path.into(),
            table,
            payload,
            target_keys: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn invalidates(mut self, key: impl Into<CacheKey>) -> Self {
        self.target_keys.insert(key.into());
        self
    }

    /// Check the payload against the encoding table and build the body.
    pub fn encode(&self) -> Result<EncodedBody, SyncError> {
        Ok(encoding::encode(self.table, &self.payload)?)
    }
}

/// Lifecycle of one call site's mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    Idle,
    Pending,
    Success(Envelope<T>),
    Error(ErrorInfo),
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        MutationState::Idle
    }
}

impl<T> MutationState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, MutationState::Success(_) | MutationState::Error(_))
    }

    /// Success or error text to show the user once settled.
    pub fn message(&self) -> Option<&str> {
        match self {
            MutationState::Success(envelope) => Some(&envelope.message),
            MutationState::Error(error) => Some(&error.message),
            _ => None,
        }
    }
}

/// Executes mutations against the transport and invalidates the cache.
#[derive(Clone)]
pub struct MutationController {
    transport: Arc<dyn Transport>,
    store: ResourceStore,
}

impl std::fmt::Debug for MutationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationController")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl MutationController {
    pub fn new(transport: Arc<dyn Transport>, store: ResourceStore) -> Self {
        Self { transport, store }
    }

    /// Run `request` and return the decoded envelope.
    ///
    /// An encoding failure returns before anything is sent and invalidates
    /// nothing. Once the request was sent, every target key is invalidated
    /// exactly once regardless of the outcome.
    pub async fn execute<T: DeserializeOwned>(&self, request: MutationRequest) -> Result<Envelope<T>, SyncError> {
        let body = request.encode()?;

        debug!(path = %request.path, "Submitting mutation");
        let result = self.submit(&request.path, body).await;

        for key in &request.target_keys {
            self.store.invalidate(key);
        }

        match &result {
            Ok(envelope) => info!(path = %request.path, message = %envelope.message, "Mutation succeeded"),
            Err(e) => warn!(path = %request.path, error = %e, "Mutation failed"),
        }
        result
    }

    async fn submit<T: DeserializeOwned>(&self, path: &str, body: EncodedBody) -> Result<Envelope<T>, SyncError> {
        let raw = self.transport.post(path, body).await?;
        Ok(envelope::decode(&raw)?)
    }

    /// A call-site tracker bound to this controller.
    pub fn mutation<T: DeserializeOwned>(&self) -> Mutation<T> {
        Mutation::new(self.clone())
    }
}

/// Tracks the state of one call site's mutation (e.g. one form).
#[derive(Debug)]
pub struct Mutation<T> {
    controller: MutationController,
    state: MutationState<T>,
}

impl<T: DeserializeOwned> Mutation<T> {
    pub fn new(controller: MutationController) -> Self {
        Self {
            controller,
            state: MutationState::Idle,
        }
    }

    /// Execute and settle into exactly one of `Success` or `Error`.
    pub async fn execute(&mut self, request: MutationRequest) -> &MutationState<T> {
        self.state = MutationState::Pending;
        self.state = match self.controller.execute(request).await {
            Ok(envelope) => MutationState::Success(envelope),
            Err(e) => MutationState::Error(ErrorInfo::from(&e)),
        };
        &self.state
    }

    pub fn state(&self) -> &MutationState<T> {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = MutationState::Idle;
    }
}
