//! Time-bounded server blacklist.
//!
//! After a kick-out, the server that failed the stream is ineligible for
//! reassignment until its entry expires. The blacklist is owned by the
//! single active owner of a partition task, so no cross-stream locking is
//! involved; entries are purged lazily on lookup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct BlacklistEntry {
    expires_at: Instant,
    /// How long the server had been serving the stream when it was kicked
    /// out; kept for diagnostics.
    service_time: Duration,
}

/// Servers a partition task must avoid for a while.
#[derive(Debug, Default)]
pub struct ServerBlacklist {
    entries: HashMap<SocketAddr, BlacklistEntry>,
}

impl ServerBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blacklist `svr` for `survival_time` from now. Re-adding an already
    /// blacklisted server restarts its clock.
    pub fn add(&mut self, svr: SocketAddr, service_time: Duration, survival_time: Duration) {
        let expires_at = Instant::now() + survival_time;
        debug!(
            %svr,
            service_time_ms = service_time.as_millis() as u64,
            survival_time_ms = survival_time.as_millis() as u64,
            "server added to blacklist"
        );
        self.entries.insert(
            svr,
            BlacklistEntry {
                expires_at,
                service_time,
            },
        );
    }

    /// Whether `svr` is currently ineligible. Expired entries are removed
    /// on the way through.
    pub fn is_blacklisted(&mut self, svr: &SocketAddr) -> bool {
        match self.entries.get(svr) {
            Some(entry) if entry.expires_at <= Instant::now() => {
                self.entries.remove(svr);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Recorded service time for a still-blacklisted server.
    pub fn service_time(&self, svr: &SocketAddr) -> Option<Duration> {
        self.entries.get(svr).map(|entry| entry.service_time)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
