//! REST and WebSocket API.
//!
//! Serves the current snapshot, the live feed, persisted history,
//! notification administration and job event ingest.

pub mod error;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
