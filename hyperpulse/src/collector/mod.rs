//! Snapshot collection.
//!
//! The [`Collector`] samples every registered source on a fixed interval,
//! assembles a [`Snapshot`](crate::snapshot::Snapshot), makes it current and
//! hands it to the broadcast hub. A slower loop persists the current snapshot
//! to the history store.

mod assemble;
mod service;

pub use assemble::SourceOutcome;
pub use service::{Collector, CollectorConfig};
