//! In-memory buffer of the most recent entries
//!
//! Entries are shared `Arc`s kept oldest-first and never change once
//! appended.
//!
//! Without file persistence the capacity is the whole retention policy and
//! the oldest entry is dropped to make room. With persistence, entries may
//! only leave the buffer once a flush has written them, so reaching capacity
//! raises a flush request instead. If flushes keep failing the buffer still
//! stops at [`OVERFLOW_FACTOR`] times its capacity, dropping the oldest
//! entries that are not part of a batch being written.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::entry::LogEntry;

/// How far past capacity a persistent buffer may grow while a flush is pending
pub const OVERFLOW_FACTOR: usize = 2;

/// What happened while appending an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    /// The buffer reached capacity and wants to be flushed
    pub flush_wanted: bool,
    /// Entries dropped to make room
    pub evicted: usize,
}

/// A batch of entries copied out for writing
#[derive(Debug, Clone)]
pub struct PendingBatch {
    /// Entries oldest-first
    pub entries: Vec<Arc<LogEntry>>,
}

/// Bounded, time-ordered buffer of recent entries
#[derive(Debug)]
pub struct MemoryBuffer {
    entries: VecDeque<Arc<LogEntry>>,
    capacity: usize,
    persistent: bool,
    flush_pending: bool,
    /// Leading entries that belong to the batch being written
    in_flight: usize,
    dropped: u64,
}

impl MemoryBuffer {
    /// Create a buffer holding up to `capacity` entries
    pub fn new(capacity: usize, persistent: bool) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            persistent,
            flush_pending: false,
            in_flight: 0,
            dropped: 0,
        }
    }

    /// Append an entry, evicting if the bound requires it
    ///
    /// Entries of the batch being written are neither counted against the
    /// bound nor evicted: until the write commits they exist only here.
    pub fn append(&mut self, entry: Arc<LogEntry>) -> AppendOutcome {
        let limit = if self.persistent {
            self.capacity.saturating_mul(OVERFLOW_FACTOR)
        } else {
            self.capacity
        };

        let mut evicted = 0;
        while self.entries.len() - self.in_flight >= limit {
            if self.entries.remove(self.in_flight).is_none() {
                break;
            }
            self.dropped += 1;
            evicted += 1;
        }

        self.entries.push_back(entry);

        let flush_wanted = self.persistent && self.entries.len() >= self.capacity;
        if flush_wanted {
            self.flush_pending = true;
        }

        AppendOutcome {
            flush_wanted,
            evicted,
        }
    }

    /// Current contents, newest first
    pub fn snapshot(&self) -> Vec<Arc<LogEntry>> {
        self.entries.iter().rev().cloned().collect()
    }

    /// Copy out everything not yet written, oldest first
    pub fn pending(&mut self) -> PendingBatch {
        self.in_flight = self.entries.len();
        PendingBatch {
            entries: self.entries.iter().cloned().collect(),
        }
    }

    /// Drop the batch taken by [`pending`](Self::pending) after it was written
    ///
    /// Entries appended after the batch was taken stay in place.
    pub fn commit(&mut self) {
        self.entries.drain(..self.in_flight);
        self.in_flight = 0;
        self.flush_pending = self.persistent && self.entries.len() >= self.capacity;
    }

    /// Forget the batch in flight after its write failed
    pub fn abort(&mut self) {
        self.in_flight = 0;
    }

    /// Whether the buffer reached capacity since the last flush
    pub fn flush_pending(&self) -> bool {
        self.flush_pending
    }

    /// Discard all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight = 0;
        self.flush_pending = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted without reaching disk since the buffer was created
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
