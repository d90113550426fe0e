use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::snapshot::{
    ALERTS_CAP, Alert, AlertLevel, BoundedList, CarbonStats, HealthState, RECENT_JOBS_CAP,
    SavingsInput, SavingsPolicy, Snapshot, SourceState, SourceStatus,
};
use crate::source::SourceReport;

/// What one source contributed to a tick.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Fresh(SourceReport),
    /// The fetch failed; the report is the last successful one.
    Stale {
        report: SourceReport,
        last_success: DateTime<Utc>,
        error: String,
    },
    Unavailable {
        error: String,
    },
}

impl SourceOutcome {
    fn state(&self) -> SourceState {
        match self {
            SourceOutcome::Fresh(_) => SourceState::Fresh,
            SourceOutcome::Stale { .. } => SourceState::Stale,
            SourceOutcome::Unavailable { .. } => SourceState::Unavailable,
        }
    }

    fn report(&self) -> Option<&SourceReport> {
        match self {
            SourceOutcome::Fresh(report) | SourceOutcome::Stale { report, .. } => Some(report),
            SourceOutcome::Unavailable { .. } => None,
        }
    }
}

pub(crate) struct Assembly<'a> {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub outcomes: Vec<(String, SourceOutcome)>,
    pub subscribers: usize,
    pub savings: &'a dyn SavingsPolicy,
}

/// Build a snapshot from per-source outcomes.
pub(crate) fn assemble(input: Assembly<'_>) -> Snapshot {
    let mut merged = SourceReport::default();
    let mut sources = BTreeMap::new();

    for (name, outcome) in &input.outcomes {
        if let Some(report) = outcome.report() {
            merged.merge(report);
        }

        let status = match outcome {
            SourceOutcome::Fresh(_) => SourceStatus {
                state: SourceState::Fresh,
                last_success: Some(input.timestamp),
                error: None,
            },
            SourceOutcome::Stale {
                last_success,
                error,
                ..
            } => SourceStatus {
                state: SourceState::Stale,
                last_success: Some(*last_success),
                error: Some(error.clone()),
            },
            SourceOutcome::Unavailable { error } => SourceStatus {
                state: SourceState::Unavailable,
                last_success: None,
                error: Some(error.clone()),
            },
        };
        sources.insert(name.clone(), status);
    }

    let health = derive_health(input.outcomes.iter().map(|(_, o)| o.state()));

    merged.recent_jobs.sort_by_key(|job| job.updated_at);
    let mut recent_jobs = BoundedList::new(RECENT_JOBS_CAP);
    recent_jobs.extend(merged.recent_jobs);

    let mut alerts = BoundedList::new(ALERTS_CAP);
    alerts.extend(merged.alerts);
    for (name, status) in &sources {
        if status.state == SourceState::Unavailable {
            alerts.push(Alert::new(
                AlertLevel::Warning,
                name.clone(),
                format!("Source '{}' is unavailable", name),
            ));
        }
    }
    if merged.virtual_machines.failed > 0 {
        alerts.push(Alert::new(
            AlertLevel::Error,
            "collector",
            format!("{} virtual machines have failed", merged.virtual_machines.failed),
        ));
    }
    if merged.jobs.failed > merged.jobs.completed {
        alerts.push(Alert::new(
            AlertLevel::Warning,
            "collector",
            format!(
                "Failed jobs ({}) exceed completed jobs ({})",
                merged.jobs.failed, merged.jobs.completed
            ),
        ));
    }

    let estimated_savings_kg = input.savings.estimate_kg(&SavingsInput {
        average_intensity_gco2_kwh: merged.carbon.average_intensity_gco2_kwh,
        carbon_aware_vms: merged.carbon.carbon_aware_vms,
        completed_backups: merged.backups.completed,
    });

    Snapshot {
        sequence: input.sequence,
        timestamp: input.timestamp,
        jobs: merged.jobs,
        resources: merged.resources,
        virtual_machines: merged.virtual_machines,
        backups: merged.backups,
        restores: merged.restores,
        jobs_by_provider: merged.jobs_by_provider,
        carbon: CarbonStats {
            carbon_aware_vms: merged.carbon.carbon_aware_vms,
            average_intensity_gco2_kwh: merged.carbon.average_intensity_gco2_kwh,
            estimated_savings_kg,
        },
        recent_jobs,
        alerts,
        sources,
        subscribers: input.subscribers,
        health,
    }
}

/// Unavailable when every source is, degraded when any is not fresh.
fn derive_health(states: impl Iterator<Item = SourceState>) -> HealthState {
    let mut any = false;
    let mut all_unavailable = true;
    let mut any_degraded = false;
    for state in states {
        any = true;
        all_unavailable &= state == SourceState::Unavailable;
        any_degraded |= state != SourceState::Fresh;
    }
    if any && all_unavailable {
        HealthState::Unavailable
    } else if any_degraded {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}
