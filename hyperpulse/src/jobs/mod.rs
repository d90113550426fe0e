//! Job lifecycle integration.
//!
//! The conversion/backup engine reports lifecycle transitions as [`JobEvent`]s.
//! They travel over a [`JobEventBroadcaster`] to a listener that keeps the
//! [`JobBoard`] tallies current and forwards each event to the notification
//! dispatcher.

mod board;
mod events;
mod listener;

pub use board::JobBoard;
pub use events::{JobEvent, JobEventBroadcaster};
pub use listener::spawn_lifecycle_listener;
