use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{JobBoard, JobEvent};
use crate::notification::NotificationDispatcher;

/// Apply lifecycle events to `board` and forward them to `dispatcher`.
///
/// Runs until the token is cancelled or every sender is dropped.
pub fn spawn_lifecycle_listener(
    mut rx: broadcast::Receiver<JobEvent>,
    board: Arc<JobBoard>,
    dispatcher: Option<Arc<NotificationDispatcher>>,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("Job lifecycle listener shutting down");
                    break;
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            board.apply(&event);
                            if let Some(dispatcher) = &dispatcher {
                                dispatcher.notify(event.kind(), event.payload());
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Job lifecycle listener lagged by {} events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Job event channel closed");
                            break;
                        }
                    }
                }
            }
        }
    })
}
