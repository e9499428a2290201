//! HTTP API module.
//!
//! This module provides the axum server, its response types and the ingest
//! event stream.

pub mod events;
pub mod server;
pub mod types;

pub use events::{EventBroadcaster, EVENTS};
pub use server::{router, start_server, AppState};
pub use types::*;
