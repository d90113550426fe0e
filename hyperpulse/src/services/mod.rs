//! Service layer module.
//!
//! Wires the collector, hub, history store and notification dispatcher
//! together and owns their lifecycle.

pub mod container;

pub use container::ServiceContainer;
