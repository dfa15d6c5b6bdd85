//! Bounded message history shared between the receive loop and HTTP handlers

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::classifier::ClassifiedRecord;

/// Capacity of the reference deployment
pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(20) {
    Some(n) => n,
    None => unreachable!(),
};

/// A record as held by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Insertion number, starting at 0 and never reused
    pub seq: u64,
    /// When the record was pushed
    pub received_at: DateTime<Utc>,
    pub record: ClassifiedRecord,
}

struct Ring {
    entries: VecDeque<HistoryEntry>,
    next_seq: u64,
}

/// Fixed-capacity FIFO of classified records
///
/// Once full, every push drops the oldest entry. `push` and `snapshot` run
/// under one lock so a reader always sees a whole number of pushes.
pub struct MessageStore {
    capacity: NonZeroUsize,
    inner: Mutex<Ring>,
}

impl MessageStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity.get()),
                next_seq: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Append a record, evicting the oldest one when full
    ///
    /// Returns the sequence number assigned to the record.
    pub fn push(&self, record: ClassifiedRecord) -> u64 {
        let received_at = Utc::now();

        let mut ring = self.inner.lock();
        if ring.entries.len() == self.capacity.get() {
            ring.entries.pop_front();
        }
        let seq = ring.next_seq;
        ring.next_seq += 1;
        ring.entries.push_back(HistoryEntry {
            seq,
            received_at,
            record,
        });
        seq
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of records ever pushed, evicted ones included
    pub fn total_pushed(&self) -> u64 {
        self.inner.lock().next_seq
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
