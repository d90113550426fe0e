//! Durable snapshot history with range queries, trends and retention.

mod export;
mod range;
mod record;
mod store;

pub use export::{CSV_HEADER, to_csv};
pub use range::{DEFAULT_HISTORY_RANGE, DEFAULT_TREND_RANGE, TimeRange};
pub use record::{FieldStats, HistoryRecord, TrendAggregate};
pub use store::{DEFAULT_RETENTION_DAYS, HistoryStore};
