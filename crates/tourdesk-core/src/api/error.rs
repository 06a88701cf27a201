use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - please sign in again")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error bodies from the API carry a human-readable `message`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl TransportError {
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer the server's `message` field, fall back to the (truncated) raw body.
    fn server_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => parsed.message,
            Err(_) => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = Self::server_message(body);
        match status {
            401 => TransportError::Unauthorized,
            403 => TransportError::AccessDenied(message),
            404 => TransportError::NotFound(message),
            429 => TransportError::RateLimited,
            500..=599 => TransportError::ServerError(message),
            _ => TransportError::Rejected { status, message },
        }
    }

    /// The text shown to the user for this failure.
    pub fn message(&self) -> String {
        match self {
            TransportError::AccessDenied(m)
            | TransportError::NotFound(m)
            | TransportError::ServerError(m)
            | TransportError::Rejected { message: m, .. } => m.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::InvalidResponse(err.to_string())
        } else {
            TransportError::NetworkError(err.to_string())
        }
    }
}
