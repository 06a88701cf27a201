//! Session management for the admin API.
//!
//! Sessions are persisted to the cache directory and expire 24 hours after
//! login. Logging out also empties the resource cache so nothing fetched
//! under one account is shown to the next.

pub mod session;

pub use session::{Session, SessionData};
