use std::sync::Arc;

use parking_lot::RwLock;

use super::Snapshot;

type Shared = Arc<RwLock<Arc<Snapshot>>>;

/// Create the shared current-snapshot slot.
///
/// The writer goes to the collector; readers may be cloned freely.
pub fn snapshot_cell() -> (SnapshotWriter, SnapshotReader) {
    let shared: Shared = Arc::new(RwLock::new(Arc::new(Snapshot::empty())));
    (
        SnapshotWriter {
            shared: shared.clone(),
        },
        SnapshotReader { shared },
    )
}

/// Sole write handle for the current snapshot. Not `Clone`.
#[derive(Debug)]
pub struct SnapshotWriter {
    shared: Shared,
}

impl SnapshotWriter {
    /// Swap in a newly assembled snapshot and return the shared handle to it.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.shared.write() = snapshot.clone();
        snapshot
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            shared: self.shared.clone(),
        }
    }
}

/// Read handle for the current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    shared: Shared,
}

impl SnapshotReader {
    /// The latest published snapshot. The value itself is immutable.
    pub fn current(&self) -> Arc<Snapshot> {
        self.shared.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_observe_replacement() {
        let (writer, reader) = snapshot_cell();
        let before = reader.current();
        assert_eq!(before.sequence, 0);

        let mut next = Snapshot::empty();
        next.sequence = 7;
        writer.replace(next);

        assert_eq!(reader.current().sequence, 7);
        assert_eq!(writer.reader().current().sequence, 7);
        // Earlier handles keep the value they were given.
        assert_eq!(before.sequence, 0);
    }
}
