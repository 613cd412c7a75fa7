//! Missing-log bookkeeping.
//!
//! A transaction's commit or state record may reference redo entries that
//! were written on a different log stream position and are not locally
//! present. `MissingLogInfo` collects those references: zero or more
//! redo/state LSNs plus at most one record-log LSN, which is always fetched
//! last. Resolution is chained: entries discovered while resolving one set
//! become the next round's input.

use logcdc_core::Lsn;

#[derive(Debug, Clone, Default)]
pub struct MissingLogInfo {
    redo_or_state: Vec<Lsn>,
    record_log: Option<Lsn>,
    /// Set while re-reading entries fetched through resolution, so the
    /// reader knows not to report the same references again.
    resolving: bool,
    /// The originating commit/state entry must be consumed again once all
    /// referenced entries are present.
    reconsume_commit_entry: bool,
}

impl MissingLogInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_redo_or_state(&mut self, lsn: Lsn) {
        self.redo_or_state.push(lsn);
    }

    /// At most one record-log reference exists; the last one set wins.
    pub fn set_record_log(&mut self, lsn: Lsn) {
        self.record_log = Some(lsn);
    }

    pub fn redo_or_state(&self) -> &[Lsn] {
        &self.redo_or_state
    }

    pub fn record_log(&self) -> Option<Lsn> {
        self.record_log
    }

    pub fn is_empty(&self) -> bool {
        self.redo_or_state.is_empty() && self.record_log.is_none()
    }

    /// Entries still to fetch, record log included.
    pub fn total_count(&self) -> usize {
        self.redo_or_state.len() + usize::from(self.record_log.is_some())
    }

    pub fn sort_and_dedup(&mut self) {
        self.redo_or_state.sort_unstable();
        self.redo_or_state.dedup();
    }

    /// The `fetched`-th entry to request: redo/state LSNs in order, then the
    /// record log.
    pub fn lsn_at(&self, fetched: usize) -> Option<Lsn> {
        if fetched < self.redo_or_state.len() {
            Some(self.redo_or_state[fetched])
        } else if fetched == self.redo_or_state.len() {
            self.record_log
        } else {
            None
        }
    }

    /// Build the next RPC batch starting after `fetched` already-resolved
    /// entries, at most `max_per_rpc` redo/state LSNs. The batch that
    /// consumes the final redo/state LSN also carries the record log.
    pub fn next_batch(&self, fetched: usize, max_per_rpc: usize) -> Vec<Lsn> {
        let mut batch: Vec<Lsn> = self
            .redo_or_state
            .iter()
            .skip(fetched)
            .take(max_per_rpc)
            .copied()
            .collect();

        if fetched + batch.len() == self.redo_or_state.len() {
            if let Some(record) = self.record_log {
                batch.push(record);
            }
        }

        batch
    }

    pub fn set_resolving(&mut self) {
        self.resolving = true;
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn set_reconsume_commit_entry(&mut self) {
        self.reconsume_commit_entry = true;
    }

    pub fn need_reconsume_commit_entry(&self) -> bool {
        self.reconsume_commit_entry
    }
}
