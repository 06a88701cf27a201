//! REST API access for the tourdesk backend.
//!
//! The `Transport` trait is the seam the controllers depend on; `ApiClient`
//! is its `reqwest` implementation with bearer token authentication.
//! Every non-2xx status surfaces as a `TransportError`.

pub mod client;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use error::TransportError;
pub use transport::Transport;
