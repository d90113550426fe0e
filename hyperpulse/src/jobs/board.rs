//! In-process tally of job lifecycle events.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::JobEvent;
use crate::snapshot::{BoundedList, JobCounts, RECENT_JOBS_CAP, RecentJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
}

#[derive(Debug, Clone)]
struct TrackedJob {
    phase: Phase,
    provider: Option<String>,
    progress: Option<f64>,
}

#[derive(Debug)]
struct BoardState {
    counts: JobCounts,
    in_flight: HashMap<String, TrackedJob>,
    by_provider: BTreeMap<String, u64>,
    recent: BoundedList<RecentJob>,
}

/// Job counters maintained from lifecycle events.
#[derive(Debug)]
pub struct JobBoard {
    state: RwLock<BoardState>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BoardState {
                counts: JobCounts::default(),
                in_flight: HashMap::new(),
                by_provider: BTreeMap::new(),
                recent: BoundedList::new(RECENT_JOBS_CAP),
            }),
        }
    }

    /// Fold one lifecycle event into the tallies.
    pub fn apply(&self, event: &JobEvent) {
        let mut state = self.state.write();
        match event {
            JobEvent::Created {
                job_id,
                job_name,
                provider,
                timestamp,
                ..
            } => {
                if state.in_flight.contains_key(job_id) {
                    return;
                }
                state.counts.pending += 1;
                if let Some(provider) = provider {
                    *state.by_provider.entry(provider.clone()).or_insert(0) += 1;
                }
                state.in_flight.insert(
                    job_id.clone(),
                    TrackedJob {
                        phase: Phase::Pending,
                        provider: provider.clone(),
                        progress: None,
                    },
                );
                push_recent(&mut state, job_id, job_name, "pending", *timestamp);
            }
            JobEvent::Started {
                job_id,
                job_name,
                provider,
                timestamp,
            } => {
                let previous = state.in_flight.get(job_id).map(|job| job.phase);
                match previous {
                    Some(Phase::Running) => return,
                    Some(Phase::Pending) => {
                        state.counts.pending = state.counts.pending.saturating_sub(1);
                    }
                    None => {
                        if let Some(provider) = provider {
                            *state.by_provider.entry(provider.clone()).or_insert(0) += 1;
                        }
                    }
                }
                state.counts.active += 1;
                let tracked = state
                    .in_flight
                    .entry(job_id.clone())
                    .or_insert_with(|| TrackedJob {
                        phase: Phase::Running,
                        provider: provider.clone(),
                        progress: None,
                    });
                tracked.phase = Phase::Running;
                push_recent(&mut state, job_id, job_name, "running", *timestamp);
            }
            JobEvent::Progress {
                job_id,
                percent_complete,
                ..
            } => {
                if let Some(job) = state.in_flight.get_mut(job_id) {
                    job.progress = Some(*percent_complete);
                }
            }
            JobEvent::Completed {
                job_id,
                job_name,
                timestamp,
                ..
            } => {
                push_recent(&mut state, job_id, job_name, "completed", *timestamp);
                finish(&mut state, job_id);
                state.counts.completed += 1;
            }
            JobEvent::Failed {
                job_id,
                job_name,
                timestamp,
                ..
            } => {
                push_recent(&mut state, job_id, job_name, "failed", *timestamp);
                finish(&mut state, job_id);
                state.counts.failed += 1;
            }
            JobEvent::Cancelled {
                job_id,
                job_name,
                timestamp,
            } => {
                push_recent(&mut state, job_id, job_name, "cancelled", *timestamp);
                finish(&mut state, job_id);
                state.counts.cancelled += 1;
            }
        }
        state.counts.queue_length = state.counts.pending;
    }

    pub fn counts(&self) -> JobCounts {
        self.state.read().counts
    }

    pub fn jobs_by_provider(&self) -> BTreeMap<String, u64> {
        self.state.read().by_provider.clone()
    }

    /// Recent jobs, oldest first.
    pub fn recent_jobs(&self) -> Vec<RecentJob> {
        let state = self.state.read();
        state
            .recent
            .iter()
            .cloned()
            .map(|mut job| {
                if let Some(tracked) = state.in_flight.get(&job.id) {
                    job.progress_percent = tracked.progress.or(job.progress_percent);
                }
                job
            })
            .collect()
    }

    /// Latest known state of one job from the recent list.
    pub fn job(&self, job_id: &str) -> Option<RecentJob> {
        let state = self.state.read();
        let mut job = state.recent.iter().rev().find(|job| job.id == job_id)?.clone();
        if let Some(tracked) = state.in_flight.get(job_id) {
            job.progress_percent = tracked.progress.or(job.progress_percent);
        }
        Some(job)
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(state: &mut BoardState, job_id: &str) {
    match state.in_flight.remove(job_id).map(|job| job.phase) {
        Some(Phase::Pending) => state.counts.pending = state.counts.pending.saturating_sub(1),
        Some(Phase::Running) => state.counts.active = state.counts.active.saturating_sub(1),
        None => {}
    }
}

fn push_recent(
    state: &mut BoardState,
    job_id: &str,
    job_name: &str,
    status: &str,
    timestamp: DateTime<Utc>,
) {
    let tracked = state.in_flight.get(job_id);
    let job = RecentJob {
        id: job_id.to_string(),
        name: job_name.to_string(),
        status: status.to_string(),
        provider: tracked.and_then(|job| job.provider.clone()),
        progress_percent: tracked.and_then(|job| job.progress),
        updated_at: timestamp,
    };
    state.recent.push(job);
}
