//! Error taxonomy for the synchronization layer.
//!
//! Fetch failures are recorded in the cache as [`ErrorInfo`]; mutation
//! failures are returned to the caller as [`SyncError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::api::TransportError;

/// The server response did not match the expected envelope or payload shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Response body is not valid JSON: {0}")]
    NotJson(String),

    #[error("Response envelope is not an object")]
    NotAnObject,

    #[error("Response envelope is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Response `message` is not a string")]
    MessageNotString,

    #[error("Response payload has an unexpected shape: {0}")]
    PayloadShape(String),
}

/// Caller-side pre-flight failure. The mutation is never sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please select a {0}")]
    MissingSelection(&'static str),

    #[error("Please upload a {0}")]
    MissingFile(&'static str),

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Field `{0}` is not accepted by this resource")]
    UnknownField(String),

    #[error("Field `{field}` must be encoded as {expected}")]
    WrongEncoding {
        field: String,
        expected: &'static str,
    },

    #[error("Please add at least one itinerary item")]
    EmptyItinerary,
}

/// Any failure the synchronization layer can surface.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Cache key `{0}` holds a different payload type")]
    TypeMismatch(String),
}

impl SyncError {
    /// Human-readable message suitable for a toast or status line.
    pub fn message(&self) -> String {
        match self {
            SyncError::Transport(e) => e.message(),
            other => other.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Decode(_) | SyncError::TypeMismatch(_) => ErrorKind::Decode,
            SyncError::Transport(_) => ErrorKind::Transport,
            SyncError::Validation(_) => ErrorKind::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    Transport,
    Validation,
}

/// Cloneable error snapshot stored in cache entries and mutation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for ErrorInfo {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message(),
        }
    }
}

impl From<SyncError> for ErrorInfo {
    fn from(err: SyncError) -> Self {
        ErrorInfo::from(&err)
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
