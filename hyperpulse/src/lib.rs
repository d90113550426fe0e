//! hyperpulse library crate.
//!
//! Live operational telemetry for the conversion platform: a periodic
//! collector assembles snapshots from independent sources, a broadcast hub
//! fans them out to WebSocket viewers, a history store persists samples
//! and a dispatcher delivers job lifecycle webhooks.

pub mod api;
pub mod collector;
pub mod config;
pub mod database;
pub mod error;
pub mod history;
pub mod hub;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod notification;
pub mod panic_hook;
pub mod services;
pub mod snapshot;
pub mod source;
pub mod utils;

pub use error::{Error, Result};
