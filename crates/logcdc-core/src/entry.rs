//! Opaque log entry containers.
//!
//! The fetch engine never looks inside an entry payload; decoding redo
//! records is the downstream parser's job. What the engine does care about
//! is grouping: progress may only advance once an entire group entry has
//! been consumed.

use crate::Lsn;
use bytes::Bytes;

/// A single log entry within a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    lsn: Lsn,
    payload: Bytes,
}

impl LogEntry {
    pub fn new(lsn: Lsn, payload: Bytes) -> Self {
        Self { lsn, payload }
    }

    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A group of log entries appended atomically to the stream.
///
/// Padding groups fill alignment holes at the tail of a block; they carry no
/// entries but still advance the stream position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    start_lsn: Lsn,
    padding: bool,
    entries: Vec<LogEntry>,
}

impl GroupEntry {
    pub fn new(start_lsn: Lsn, entries: Vec<LogEntry>) -> Self {
        Self {
            start_lsn,
            padding: false,
            entries,
        }
    }

    pub fn padding(start_lsn: Lsn) -> Self {
        Self {
            start_lsn,
            padding: true,
            entries: Vec::new(),
        }
    }

    pub fn start_lsn(&self) -> Lsn {
        self.start_lsn
    }

    pub fn is_padding(&self) -> bool {
        self.padding
    }

    /// Member entries in increasing LSN order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn log_cnt(&self) -> usize {
        self.entries.len()
    }
}
