//! Flat CSV export of history records.

use std::fmt::Write;

use super::HistoryRecord;

pub const CSV_HEADER: &str = "Timestamp,Total VMs,Running VMs,Stopped VMs,Failed VMs,Total Backups,Completed Backups,Failed Backups,Total Restores,Active Jobs,Failed Jobs,Total CPUs,Total Memory (GiB),Avg Carbon Intensity,Carbon Aware VMs";

/// Render records as CSV, one row per record plus a header line.
///
/// All fields are numeric or RFC3339, so no quoting is needed.
pub fn to_csv(records: &[HistoryRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + records.len() * 96);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for r in records {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{:.2},{:.2},{}",
            r.timestamp.to_rfc3339(),
            r.total_vms,
            r.running_vms,
            r.stopped_vms,
            r.failed_vms,
            r.total_backups,
            r.completed_backups,
            r.failed_backups,
            r.total_restores,
            r.active_jobs,
            r.failed_jobs,
            r.total_cpus,
            r.total_memory_gib,
            r.avg_carbon_intensity,
            r.carbon_aware_vms,
        );
    }
    out
}
