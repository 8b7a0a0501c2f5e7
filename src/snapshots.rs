//! Snapshots scope a read to the state of the database at a point in time.

use std::sync::Arc;

use crate::utils::linked_list::{LinkedList, SharedNode};

/**
Represents the state of the database at a particular point in time.

A snapshot is immutable and opaque to database clients. It stays live, pinning its sequence
number in the snapshot list, until it is handed back to [`SnapshotList::delete_snapshot`].
*/
#[derive(Clone)]
pub struct Snapshot {
    /// The node in the snapshot list backing this snapshot.
    inner: SharedNode<InnerSnapshot>,
}

/// Public methods
impl Snapshot {
    /// The sequence number at which this snapshot was taken.
    pub fn sequence_number(&self) -> u64 {
        self.inner.read().element.sequence_number
    }
}

/// Crate-only methods
impl Snapshot {
    /// Get a reference to the snapshot's internal representation.
    pub(crate) fn inner(&self) -> SharedNode<InnerSnapshot> {
        Arc::clone(&self.inner)
    }
}

/// The internal representation of a snapshot.
pub(crate) struct InnerSnapshot {
    /// The sequence number at which the snapshot was taken.
    sequence_number: u64,
}

/**
The list of outstanding snapshots, oldest first.

A compactor may treat any version of a user key with a sequence number at or below
[`SnapshotList::oldest`] as the only version any current reader can see, and may drop
tombstoned versions at or below it when no older visible version remains.
*/
pub struct SnapshotList {
    /// The actual list of snapshots.
    list: LinkedList<InnerSnapshot>,
}

impl Default for SnapshotList {
    fn default() -> Self {
        Self::new()
    }
}

/// Public methods
impl SnapshotList {
    /// Create a new, empty [`SnapshotList`].
    pub fn new() -> Self {
        Self {
            list: LinkedList::new(),
        }
    }

    /**
    Create a new snapshot at `sequence_number` and append it to the list.

    # Panics

    The sequence number must be at least as large as every sequence number already in the
    list. This is trivially true in the engine because sequence numbers only increase.
    */
    pub fn new_snapshot(&mut self, sequence_number: u64) -> Snapshot {
        assert!(self.is_empty() || self.newest() <= sequence_number);

        let node = self.list.push(InnerSnapshot { sequence_number });

        Snapshot { inner: node }
    }

    /// Remove a snapshot from the list.
    pub fn delete_snapshot(&mut self, snapshot: Snapshot) {
        self.list.remove_node(snapshot.inner());
    }

    /// Returns true if there are no outstanding snapshots.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /**
    The sequence number of the oldest outstanding snapshot.

    # Panics

    The list must not be empty.
    */
    pub fn oldest(&self) -> u64 {
        self.list
            .head()
            .expect("Requested the oldest snapshot of an empty snapshot list.")
            .read()
            .element
            .sequence_number
    }

    /**
    The sequence number of the newest outstanding snapshot.

    # Panics

    The list must not be empty.
    */
    pub fn newest(&self) -> u64 {
        self.list
            .tail()
            .expect("Requested the newest snapshot of an empty snapshot list.")
            .read()
            .element
            .sequence_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn a_new_snapshot_can_be_requested() {
        let mut snapshots = SnapshotList::new();
        let snapshot1 = snapshots.new_snapshot(1000);

        assert_eq!(snapshot1.sequence_number(), 1000);
        assert_eq!(snapshots.newest(), 1000);

        let snapshot2 = snapshots.new_snapshot(2000);

        assert_eq!(snapshot2.sequence_number(), 2000);
        assert_eq!(snapshots.newest(), 2000);
        assert_eq!(snapshots.oldest(), 1000);
    }

    #[test]
    fn snapshots_can_be_taken_at_the_same_sequence_number() {
        let mut snapshots = SnapshotList::new();
        snapshots.new_snapshot(1000);
        snapshots.new_snapshot(1000);

        assert_eq!(snapshots.oldest(), 1000);
        assert_eq!(snapshots.newest(), 1000);
    }

    #[test]
    fn snapshots_can_be_removed() {
        let mut snapshots = SnapshotList::new();
        let snapshot1 = snapshots.new_snapshot(1000);
        let snapshot2 = snapshots.new_snapshot(2000);
        let snapshot3 = snapshots.new_snapshot(3000);

        snapshots.delete_snapshot(snapshot2);
        assert_eq!(snapshots.oldest(), 1000);
        assert_eq!(snapshots.newest(), 3000);

        snapshots.delete_snapshot(snapshot1);
        assert_eq!(snapshots.oldest(), 3000);

        snapshots.delete_snapshot(snapshot3);
        assert!(snapshots.is_empty());
    }
}
