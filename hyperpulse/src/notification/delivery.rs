//! Bounded-retry delivery of a single message to a single endpoint.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::channels::{NotificationChannel, OutboundMessage};
use super::endpoint::NotificationEndpoint;

/// Delay before retry number `retry` (1-based): `unit * 2^(retry-1)`.
pub fn retry_backoff(unit: Duration, retry: u32) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }
    let factor = 2u32.saturating_pow(retry - 1);
    unit.saturating_mul(factor)
}

/// Result of one HTTP attempt.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(String),
    Exhausted(String),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryAttempt {
    /// 1-based attempt number.
    pub index: u32,
    /// Time waited before this attempt.
    pub backoff_ms: u64,
    pub elapsed_ms: u64,
    pub outcome: AttemptOutcome,
}

/// Terminal state of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Exhausted { last_error: String },
    /// Shutdown interrupted the backoff between attempts.
    Cancelled,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryReport {
    pub endpoint_id: String,
    pub event: String,
    pub attempts: Vec<DeliveryAttempt>,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// Deliver `message` with at most `endpoint.max_attempts` attempts.
///
/// Each attempt is bounded by the endpoint timeout. Cancellation is only
/// observed while waiting between attempts, so an attempt in flight always
/// runs to completion or timeout.
pub async fn deliver(
    channel: &dyn NotificationChannel,
    endpoint: &NotificationEndpoint,
    message: &OutboundMessage,
    backoff_unit: Duration,
    cancel: &CancellationToken,
) -> DeliveryReport {
    let max_attempts = endpoint.max_attempts.max(1);
    let mut attempts = Vec::with_capacity(max_attempts as usize);
    let mut last_error = String::new();

    for index in 1..=max_attempts {
        let backoff = retry_backoff(backoff_unit, index - 1);
        if index > 1 {
            tokio::select! {
                _ = cancel.cancelled() => {
                    return DeliveryReport {
                        endpoint_id: endpoint.id.clone(),
                        event: message.event.to_string(),
                        attempts,
                        outcome: DeliveryOutcome::Cancelled,
                    };
                }
                _ = sleep(backoff) => {}
            }
        }

        let started = Instant::now();
        let result = tokio::time::timeout(endpoint.timeout(), channel.send(message)).await;
        let error = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {}ms", endpoint.timeout_ms)),
        };

        let outcome = match error {
            None => AttemptOutcome::Success,
            Some(e) if index == max_attempts => AttemptOutcome::Exhausted(e),
            Some(e) => AttemptOutcome::RetryableFailure(e),
        };
        if let AttemptOutcome::RetryableFailure(e) | AttemptOutcome::Exhausted(e) = &outcome {
            last_error = e.clone();
        }
        let delivered = outcome == AttemptOutcome::Success;

        attempts.push(DeliveryAttempt {
            index,
            backoff_ms: backoff.as_millis() as u64,
            elapsed_ms: started.elapsed().as_millis() as u64,
            outcome,
        });

        if delivered {
            return DeliveryReport {
                endpoint_id: endpoint.id.clone(),
                event: message.event.to_string(),
                attempts,
                outcome: DeliveryOutcome::Delivered,
            };
        }
    }

    DeliveryReport {
        endpoint_id: endpoint.id.clone(),
        event: message.event.to_string(),
        attempts,
        outcome: DeliveryOutcome::Exhausted { last_error },
    }
}
