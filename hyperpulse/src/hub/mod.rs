//! Live snapshot fan-out to WebSocket subscribers.
//!
//! The collector publishes into a bounded queue. A single fan-out worker
//! drains it and copies each frame into every subscriber's own bounded
//! queue, so a slow viewer loses frames instead of stalling others.

mod broadcast;
mod frame;
mod registry;

pub use broadcast::{BroadcastHub, HubConfig, HubStats};
pub use frame::{Frame, encode_snapshot_frame};
pub use registry::{SubscriberRegistry, SubscriberState, Subscription};
