//! Database models.
//!
//! These map directly to table rows and own the conversion to and from
//! domain types, including the JSON-encoded columns.

pub mod history;
pub mod notification;

pub use history::*;
pub use notification::*;
