use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use utoipa::ToSchema;

use super::Frame;
use crate::{Error, Result};

/// Lifecycle of one subscriber.
///
/// `Registered → Active → (Closing | TimedOut | WriteFailed) → Removed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberState {
    Registered,
    Active,
    Closing,
    TimedOut,
    WriteFailed,
    Removed,
}

impl SubscriberState {
    fn is_live(self) -> bool {
        matches!(self, Self::Registered | Self::Active)
    }
}

pub(crate) struct SubscriberEntry {
    pub(crate) id: u64,
    peer: Option<String>,
    registered_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    /// Exit reason once the subscriber leaves a live state.
    state: Mutex<SubscriberState>,
    pub(crate) delivered: AtomicU64,
    pub(crate) lagged: AtomicU64,
}

impl SubscriberEntry {
    fn touch(&self) {
        self.last_activity_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn idle_for(&self, now_ms: i64) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(u64::try_from(now_ms - last).unwrap_or_default())
    }

    /// Move to `next` unless a terminal reason is already recorded.
    fn transition(&self, next: SubscriberState) {
        let mut state = self.state.lock();
        if state.is_live() {
            *state = next;
        }
    }

    fn state(&self) -> SubscriberState {
        *self.state.lock()
    }
}

/// Registry slot; dropping the sender ends the subscription's receive loop.
#[derive(Clone)]
pub(crate) struct Slot {
    pub(crate) entry: Arc<SubscriberEntry>,
    pub(crate) tx: mpsc::Sender<Frame>,
}

/// Admission-controlled set of live subscribers.
pub struct SubscriberRegistry {
    slots: RwLock<HashMap<u64, Slot>>,
    max_subscribers: usize,
    buffer: usize,
    next_id: AtomicU64,
    rejected: AtomicU64,
    removed: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new(max_subscribers: usize, buffer: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            max_subscribers,
            buffer: buffer.max(1),
            next_id: AtomicU64::new(1),
            rejected: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// Admit a subscriber or fail with [`Error::AdmissionRejected`].
    pub fn register(self: &Arc<Self>, peer: Option<String>) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let entry = {
            let mut slots = self.slots.write();
            if slots.len() >= self.max_subscribers {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(Error::AdmissionRejected {
                    max: self.max_subscribers,
                });
            }
            let entry = Arc::new(SubscriberEntry {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                peer,
                registered_at: Utc::now(),
                last_activity_ms: AtomicI64::new(Utc::now().timestamp_millis()),
                state: Mutex::new(SubscriberState::Registered),
                delivered: AtomicU64::new(0),
                lagged: AtomicU64::new(0),
            });
            slots.insert(
                entry.id,
                Slot {
                    entry: Arc::clone(&entry),
                    tx,
                },
            );
            entry
        };

        debug!(
            subscriber = entry.id,
            peer = entry.peer.as_deref().unwrap_or("-"),
            "Subscriber registered"
        );
        Ok(Subscription {
            entry,
            rx,
            registry: Arc::clone(self),
        })
    }

    /// Remove a subscriber, recording `reason`. Idempotent.
    pub fn deregister(&self, id: u64, reason: SubscriberState) -> bool {
        let Some(slot) = self.slots.write().remove(&id) else {
            return false;
        };
        slot.entry.transition(reason);
        self.removed.fetch_add(1, Ordering::Relaxed);
        debug!(
            subscriber = id,
            reason = ?slot.entry.state(),
            connected_secs = (Utc::now() - slot.entry.registered_at).num_seconds(),
            "Subscriber removed"
        );
        true
    }

    /// Remove subscribers with no activity for `idle_timeout`.
    pub fn reap_idle(&self, idle_timeout: Duration) -> usize {
        let now = Utc::now().timestamp_millis();
        let idle: Vec<u64> = self
            .slots
            .read()
            .values()
            .filter(|slot| slot.entry.idle_for(now) > idle_timeout)
            .map(|slot| slot.entry.id)
            .collect();
        idle.into_iter()
            .filter(|id| self.deregister(*id, SubscriberState::TimedOut))
            .count()
    }

    pub(crate) fn targets(&self) -> Vec<Slot> {
        self.slots.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_subscribers(&self) -> usize {
        self.max_subscribers
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn removed(&self) -> u64 {
        self.removed.load(Ordering::Relaxed)
    }
}

/// A registered subscriber's receiving end.
///
/// Dropping it deregisters the subscriber.
pub struct Subscription {
    entry: Arc<SubscriberEntry>,
    rx: mpsc::Receiver<Frame>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.entry.id
    }

    /// Next frame in publication order, or `None` once removed.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Next frame newer than `sequence`. Queued frames at or below it are
    /// discarded.
    pub async fn recv_after(&mut self, sequence: u64) -> Option<Frame> {
        loop {
            let frame = self.rx.recv().await?;
            if frame.sequence() > sequence {
                return Some(frame);
            }
            debug!(
                subscriber = self.entry.id,
                sequence = frame.sequence(),
                "Skipping frame already sent"
            );
        }
    }

    /// Mark the connection as upgraded and streaming.
    pub fn activate(&self) {
        self.entry.transition(SubscriberState::Active);
        self.entry.touch();
    }

    /// Record client activity (pong or any inbound message).
    pub fn touch(&self) {
        self.entry.touch();
    }

    pub fn state(&self) -> SubscriberState {
        self.entry.state()
    }

    pub fn lagged(&self) -> u64 {
        self.entry.lagged.load(Ordering::Relaxed)
    }

    /// Leave the registry with `reason`.
    pub fn close(&self, reason: SubscriberState) {
        self.registry.deregister(self.entry.id, reason);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry
            .deregister(self.entry.id, SubscriberState::Closing);
        *self.entry.state.lock() = SubscriberState::Removed;
    }
}
