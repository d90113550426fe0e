use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::snapshot::Snapshot;

/// A serialized snapshot shared by every subscriber queue, tagged with the
/// sequence of the snapshot it carries.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    payload: Arc<str>,
}

impl Frame {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }
}

impl Deref for Frame {
    type Target = str;

    fn deref(&self) -> &str {
        &self.payload
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    timestamp: DateTime<Utc>,
    data: &'a T,
}

/// Serialize a snapshot as `{"type":"snapshot","timestamp":…,"data":…}`.
pub fn encode_snapshot_frame(snapshot: &Snapshot) -> Result<Frame> {
    let envelope = Envelope {
        kind: "snapshot",
        timestamp: Utc::now(),
        data: snapshot,
    };
    Ok(Frame {
        sequence: snapshot.sequence,
        payload: Arc::from(serde_json::to_string(&envelope)?),
    })
}
