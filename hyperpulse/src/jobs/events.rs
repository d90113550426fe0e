//! Job lifecycle events emitted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::notification::EventKind;

/// A lifecycle transition of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEvent {
    Created {
        job_id: String,
        job_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vm_path: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Started {
        job_id: String,
        job_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider: Option<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Progress {
        job_id: String,
        job_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
        percent_complete: f64,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Completed {
        job_id: String,
        job_name: String,
        duration_secs: f64,
        /// References to produced artifacts (paths, object keys).
        #[serde(default)]
        outputs: Vec<String>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Failed {
        job_id: String,
        job_name: String,
        error: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
    Cancelled {
        job_id: String,
        job_name: String,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Notification kind this event is delivered as.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created { .. } => EventKind::JobCreated,
            Self::Started { .. } => EventKind::JobStarted,
            Self::Progress { .. } => EventKind::JobProgress,
            Self::Completed { .. } => EventKind::JobCompleted,
            Self::Failed { .. } => EventKind::JobFailed,
            Self::Cancelled { .. } => EventKind::JobCancelled,
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Created { job_id, .. }
            | Self::Started { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id, .. } => job_id,
        }
    }

    pub fn job_name(&self) -> &str {
        match self {
            Self::Created { job_name, .. }
            | Self::Started { job_name, .. }
            | Self::Progress { job_name, .. }
            | Self::Completed { job_name, .. }
            | Self::Failed { job_name, .. }
            | Self::Cancelled { job_name, .. } => job_name,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Created { timestamp, .. }
            | Self::Started { timestamp, .. }
            | Self::Progress { timestamp, .. }
            | Self::Completed { timestamp, .. }
            | Self::Failed { timestamp, .. }
            | Self::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    /// The `data` object sent to notification endpoints.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "job_id": self.job_id(),
                "job_name": self.job_name(),
            })
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.job_id().trim().is_empty() {
            return Err(crate::Error::validation("job_id must not be empty"));
        }
        if let Self::Progress {
            percent_complete, ..
        } = self
            && !(0.0..=100.0).contains(percent_complete)
        {
            return Err(crate::Error::validation(
                "percent_complete must be between 0 and 100",
            ));
        }
        Ok(())
    }
}

/// Broadcaster for job lifecycle events.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: broadcast::Sender<JobEvent>,
}

impl JobEventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Returns the number of listeners it reached.
    pub fn publish(&self, event: JobEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_engine_payload() {
        let event: JobEvent = serde_json::from_str(
            r#"{"kind":"failed","job_id":"j-1","job_name":"export web-01","error":"disk full"}"#,
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::JobFailed);
        assert_eq!(event.job_id(), "j-1");

        let payload = event.payload();
        assert_eq!(payload["error"], "disk full");
        assert_eq!(payload["kind"], "failed");
    }

    #[test]
    fn test_validate_rejects_out_of_range_progress() {
        let event = JobEvent::Progress {
            job_id: "j-2".to_string(),
            job_name: "export db-01".to_string(),
            phase: None,
            percent_complete: 140.0,
            timestamp: Utc::now(),
        };
        assert!(event.validate().is_err());
    }

    #[tokio::test]
    async fn test_broadcaster_delivers_to_subscribers() {
        let broadcaster = JobEventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        let reached = broadcaster.publish(JobEvent::Cancelled {
            job_id: "j-3".to_string(),
            job_name: "export app-02".to_string(),
            timestamp: Utc::now(),
        });
        assert_eq!(reached, 1);
        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::JobCancelled);
    }
}
