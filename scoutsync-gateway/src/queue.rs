//! In-memory queue of writes that failed against the remote store.
//!
//! The queue lives only in process memory: its contents are lost if the
//! process crashes before a drain succeeds. That limitation is accepted --
//! the local cache still holds nothing for these entries (a write is cached
//! only once the remote accepted it), so a crash loses at most the writes
//! queued during a remote outage.

use serde_json::Value;
use std::collections::VecDeque;

/// One write pending replay against the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedWrite {
    pub location: String,
    pub key: String,
    pub body: Value,
}

/// FIFO queue of pending writes.
#[derive(Debug, Default)]
pub struct WriteQueue {
    entries: VecDeque<QueuedWrite>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a failed write at the back of the queue.
    pub fn push(&mut self, write: QueuedWrite) {
        self.entries.push_back(write);
    }

    /// Removes and returns all entries in FIFO order, leaving the queue
    /// empty. Drain passes work on the returned list and push back what
    /// still could not be written.
    pub fn take_all(&mut self) -> Vec<QueuedWrite> {
        self.entries.drain(..).collect()
    }

    /// Re-appends entries that failed a drain pass, preserving their order.
    pub fn extend(&mut self, writes: impl IntoIterator<Item = QueuedWrite>) {
        self.entries.extend(writes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates the queued writes front to back without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedWrite> {
        self.entries.iter()
    }
}
