//! Fixed-capacity ring buffer of log entries
//!
//! Entries are written at a cursor that wraps around once the buffer is full, so the
//! oldest entry is overwritten rather than removed. Reading a snapshot rotates the
//! storage back into chronological order.

use chrono::{DateTime, Utc};

/// Number of entries a logger keeps when no capacity is given
pub const DEFAULT_CAPACITY: usize = 1000;

/// A single log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Per-logger sequence number, starting at 1
    pub id: u64,
    /// Log message
    pub message: String,
    /// When the entry was written (absent when the logger suppresses timestamps)
    pub timestamp: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Create a new log entry stamped with the current time
    pub fn new(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a new log entry without a timestamp
    pub fn untimed(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
            timestamp: None,
        }
    }
}

/// Circular store holding the most recent `capacity` entries
#[derive(Debug)]
pub struct RingBuffer {
    entries: Vec<LogEntry>,
    /// Slot the next entry is written to
    cursor: usize,
    capacity: usize,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of zero falls back to [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            entries: Vec::new(),
            cursor: 0,
            capacity,
        }
    }

    /// Store an entry at the cursor, overwriting the oldest one when full
    pub fn append(&mut self, entry: LogEntry) {
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        } else {
            self.entries[self.cursor] = entry;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// All retained entries, oldest first
    ///
    /// Rewrites the internal layout so the oldest entry sits at index 0; the next
    /// call finds the buffer already linear and does no rotation.
    pub fn snapshot(&mut self) -> Vec<LogEntry> {
        self.normalize();
        self.entries.clone()
    }

    /// Id of the newest retained entry
    pub fn last_id(&self) -> Option<u64> {
        if self.entries.is_empty() {
            return None;
        }
        let newest = (self.cursor + self.entries.len() - 1) % self.entries.len();
        Some(self.entries[newest].id)
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn normalize(&mut self) {
        // Only a full buffer can have its cursor anywhere but the end
        if self.entries.len() == self.capacity && self.cursor != 0 {
            self.entries.rotate_left(self.cursor);
            self.cursor = 0;
        }
    }
}
