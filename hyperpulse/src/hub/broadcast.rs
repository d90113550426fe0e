use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::frame::{Frame, encode_snapshot_frame};
use super::registry::{SubscriberRegistry, SubscriberState, Subscription};
use crate::Result;
use crate::snapshot::Snapshot;

/// Broadcast hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub max_subscribers: usize,
    /// Capacity of the collector-to-worker queue.
    pub publish_queue: usize,
    /// Capacity of each subscriber's frame queue.
    pub subscriber_buffer: usize,
    pub idle_timeout: Duration,
    pub ping_interval: Duration,
    pub write_timeout: Duration,
    /// Allowed `Origin` values; empty allows all.
    pub allowed_origins: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 100,
            publish_queue: 256,
            subscriber_buffer: 64,
            idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HubStats {
    pub subscribers: usize,
    pub max_subscribers: usize,
    pub published: u64,
    /// Snapshots dropped because the publish queue was full.
    pub dropped: u64,
    pub delivered: u64,
    /// Frames skipped for a subscriber whose queue was full.
    pub lagged: u64,
    pub rejected: u64,
    pub removed: u64,
}

#[derive(Default)]
struct HubCounters {
    published: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    lagged: AtomicU64,
}

pub struct BroadcastHub {
    config: HubConfig,
    registry: Arc<SubscriberRegistry>,
    publish_tx: mpsc::Sender<Frame>,
    publish_rx: Mutex<Option<mpsc::Receiver<Frame>>>,
    counters: Arc<HubCounters>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        let (publish_tx, publish_rx) = mpsc::channel(config.publish_queue.max(1));
        Self {
            registry: Arc::new(SubscriberRegistry::new(
                config.max_subscribers,
                config.subscriber_buffer,
            )),
            config,
            publish_tx,
            publish_rx: Mutex::new(Some(publish_rx)),
            counters: Arc::new(HubCounters::default()),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn register(&self, peer: Option<String>) -> Result<Subscription> {
        self.registry.register(peer)
    }

    pub fn deregister(&self, id: u64) -> bool {
        self.registry.deregister(id, SubscriberState::Closing)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether a request with `origin` may subscribe.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.config.allowed_origins.is_empty() {
            return true;
        }
        origin.is_some_and(|origin| {
            self.config
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin))
        })
    }

    /// Enqueue a snapshot for fan-out without waiting.
    ///
    /// Returns `false` when the frame was dropped because the queue is full
    /// or the worker has stopped.
    pub fn publish(&self, snapshot: &Snapshot) -> bool {
        let frame = match encode_snapshot_frame(snapshot) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode snapshot frame: {}", e);
                return false;
            }
        };
        match self.publish_tx.try_send(frame) {
            Ok(()) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(sequence = snapshot.sequence, "Publish queue full, dropping snapshot");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Start the fan-out worker and the idle reaper.
    ///
    /// Calling it again returns no handles.
    pub fn start(&self, cancellation_token: CancellationToken) -> Vec<JoinHandle<()>> {
        let Some(publish_rx) = self.publish_rx.lock().take() else {
            return Vec::new();
        };

        let worker = tokio::spawn(fan_out(
            publish_rx,
            Arc::clone(&self.registry),
            Arc::clone(&self.counters),
            cancellation_token.clone(),
        ));

        let registry = Arc::clone(&self.registry);
        let idle_timeout = self.config.idle_timeout;
        let reaper = tokio::spawn(async move {
            let period = (idle_timeout / 2).max(Duration::from_millis(10));
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    _ = interval.tick() => {
                        let reaped = registry.reap_idle(idle_timeout);
                        if reaped > 0 {
                            info!(reaped, "Removed idle subscribers");
                        }
                    }
                }
            }
        });

        vec![worker, reaper]
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.registry.len(),
            max_subscribers: self.registry.max_subscribers(),
            published: self.counters.published.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            lagged: self.counters.lagged.load(Ordering::Relaxed),
            rejected: self.registry.rejected(),
            removed: self.registry.removed(),
        }
    }
}

async fn fan_out(
    mut publish_rx: mpsc::Receiver<Frame>,
    registry: Arc<SubscriberRegistry>,
    counters: Arc<HubCounters>,
    cancellation_token: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            frame = publish_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        for slot in registry.targets() {
            match slot.tx.try_send(frame.clone()) {
                Ok(()) => {
                    slot.entry.delivered.fetch_add(1, Ordering::Relaxed);
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    slot.entry.lagged.fetch_add(1, Ordering::Relaxed);
                    counters.lagged.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => {
                    registry.deregister(slot.entry.id, SubscriberState::WriteFailed);
                }
            }
        }
    }
    debug!("Broadcast fan-out worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(sequence: u64) -> Snapshot {
        let mut snapshot = Snapshot::empty();
        snapshot.sequence = sequence;
        snapshot
    }

    fn sequence_of(frame: &Frame) -> u64 {
        let json: serde_json::Value = serde_json::from_str(frame).unwrap();
        json["data"]["sequence"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_publication_order() {
        let hub = BroadcastHub::new(HubConfig::default());
        let token = CancellationToken::new();
        hub.start(token.clone());

        let mut subs: Vec<_> = (0..3).map(|_| hub.register(None).unwrap()).collect();
        for seq in 1..=10 {
            assert!(hub.publish(&snapshot(seq)));
        }

        for sub in &mut subs {
            let mut received = Vec::new();
            for _ in 0..10 {
                received.push(sequence_of(&sub.recv().await.unwrap()));
            }
            assert_eq!(received, (1..=10).collect::<Vec<_>>());
        }
        token.cancel();
    }

    #[tokio::test]
    async fn test_frames_queued_before_initial_snapshot_are_not_repeated() {
        let hub = BroadcastHub::new(HubConfig::default());
        let token = CancellationToken::new();
        hub.start(token.clone());
        let (writer, reader) = crate::snapshot::snapshot_cell();

        // A collector tick lands between registration and the initial read.
        let mut sub = hub.register(None).unwrap();
        writer.replace(snapshot(1));
        assert!(hub.publish(&snapshot(1)));

        let current = reader.current();
        let initial = encode_snapshot_frame(&current).unwrap();
        let mut seen = vec![sequence_of(&initial)];

        writer.replace(snapshot(2));
        assert!(hub.publish(&snapshot(2)));
        let next = tokio::time::timeout(
            Duration::from_secs(2),
            sub.recv_after(current.sequence),
        )
        .await
        .unwrap()
        .unwrap();
        seen.push(sequence_of(&next));

        assert_eq!(seen, vec![1, 2]);
        token.cancel();
    }

    #[tokio::test]
    async fn test_full_publish_queue_drops() {
        let hub = BroadcastHub::new(HubConfig {
            publish_queue: 2,
            ..Default::default()
        });
        // Worker not started, so nothing drains the queue.
        assert!(hub.publish(&snapshot(1)));
        assert!(hub.publish(&snapshot(2)));
        assert!(!hub.publish(&snapshot(3)));
        assert_eq!(hub.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_without_blocking_others() {
        let hub = BroadcastHub::new(HubConfig {
            subscriber_buffer: 2,
            ..Default::default()
        });
        let token = CancellationToken::new();
        hub.start(token.clone());

        let _slow = hub.register(None).unwrap();
        let mut fast = hub.register(None).unwrap();

        for seq in 1..=5 {
            hub.publish(&snapshot(seq));
            assert_eq!(sequence_of(&fast.recv().await.unwrap()), seq);
        }

        // The worker may still be offering frame 5 to the slow subscriber.
        for _ in 0..100 {
            if hub.stats().lagged == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hub.stats().lagged, 3);
        assert_eq!(hub.len(), 2);
        token.cancel();
    }

    #[test]
    fn test_origin_allow_list() {
        let open = BroadcastHub::new(HubConfig::default());
        assert!(open.origin_allowed(None));

        let restricted = BroadcastHub::new(HubConfig {
            allowed_origins: vec!["https://dash.example.com".to_string()],
            ..Default::default()
        });
        assert!(restricted.origin_allowed(Some("https://dash.example.com")));
        assert!(!restricted.origin_allowed(Some("https://evil.example.com")));
        assert!(!restricted.origin_allowed(None));
    }
}
