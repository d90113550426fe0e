//! Snapshot model.
//!
//! A [`Snapshot`] is one immutable, point-in-time measurement of the platform:
//! job counters, host resources, VM and backup/restore tallies, carbon stats,
//! capped lists of recent jobs and alerts, and the per-source collection status.
//!
//! The collector is the only producer. It owns a [`SnapshotWriter`]; everyone
//! else reads through a cloneable [`SnapshotReader`] that hands out the current
//! value behind an `Arc`.

mod bounded;
mod cell;
mod model;
mod savings;

pub use bounded::BoundedList;
pub use cell::{SnapshotReader, SnapshotWriter, snapshot_cell};
pub use model::{
    ALERTS_CAP, Alert, AlertLevel, CarbonStats, HealthState, JobCounts, RECENT_JOBS_CAP,
    RecentJob, ResourceUsage, Snapshot, SourceState, SourceStatus, VmCounts, WorkloadCounts,
};
pub use savings::{BaselineSavingsPolicy, NoSavingsPolicy, SavingsInput, SavingsPolicy};
