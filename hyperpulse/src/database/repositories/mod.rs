//! Repository layer for database access.

pub mod history;
pub mod notification;

pub use history::*;
pub use notification::*;
