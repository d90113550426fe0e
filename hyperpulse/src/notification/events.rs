//! Notification event kinds.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subscription entry matching every event kind.
pub const WILDCARD: &str = "*";

/// Kinds of events delivered to notification endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum EventKind {
    #[serde(rename = "job.created")]
    JobCreated,
    #[serde(rename = "job.started")]
    JobStarted,
    #[serde(rename = "job.progress")]
    JobProgress,
    #[serde(rename = "job.completed")]
    JobCompleted,
    #[serde(rename = "job.failed")]
    JobFailed,
    #[serde(rename = "job.cancelled")]
    JobCancelled,
    /// Synthetic event sent by a manual test delivery.
    #[serde(rename = "test")]
    Test,
}

impl EventKind {
    /// Every kind emitted by the job lifecycle.
    pub const LIFECYCLE: [EventKind; 6] = [
        EventKind::JobCreated,
        EventKind::JobStarted,
        EventKind::JobProgress,
        EventKind::JobCompleted,
        EventKind::JobFailed,
        EventKind::JobCancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JobCreated => "job.created",
            Self::JobStarted => "job.started",
            Self::JobProgress => "job.progress",
            Self::JobCompleted => "job.completed",
            Self::JobFailed => "job.failed",
            Self::JobCancelled => "job.cancelled",
            Self::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "job.created" => Some(Self::JobCreated),
            "job.started" => Some(Self::JobStarted),
            "job.progress" => Some(Self::JobProgress),
            "job.completed" => Some(Self::JobCompleted),
            "job.failed" => Some(Self::JobFailed),
            "job.cancelled" => Some(Self::JobCancelled),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::JobCreated => "Job Created",
            Self::JobStarted => "Job Started",
            Self::JobProgress => "Job Progress",
            Self::JobCompleted => "Job Completed",
            Self::JobFailed => "Job Failed",
            Self::JobCancelled => "Job Cancelled",
            Self::Test => "Test",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata about a subscribable event kind.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct EventKindInfo {
    pub kind: &'static str,
    pub label: &'static str,
}

/// Event kinds an endpoint may subscribe to.
pub fn event_kinds() -> Vec<EventKindInfo> {
    EventKind::LIFECYCLE
        .iter()
        .map(|kind| EventKindInfo {
            kind: kind.as_str(),
            label: kind.label(),
        })
        .collect()
}
