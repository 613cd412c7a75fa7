//! Fetcher configuration.
//!
//! All tunables are hot-reloadable: writers swap a whole snapshot through
//! [`ConfigCell`], and every processing pass reads exactly one snapshot so
//! related values (say, a timeout and the window it is compared against) are
//! never torn across a reload.

use logcdc_core::FetchStreamType;
use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for the fetch engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout for a single fetch-log RPC round (streaming and missing-log).
    pub fetch_log_rpc_timeout: Duration,
    /// Flow-control window for user (DML) streams.
    pub progress_limit_for_dml: Duration,
    /// Flow-control window for system (DDL) streams.
    pub progress_limit_for_ddl: Duration,
    /// How long a kicked-out server stays blacklisted.
    pub blacklist_survival_time: Duration,
    /// How often to probe for a higher-priority server. Zero disables the
    /// rate limit (probe on every pass).
    pub check_switch_server_interval: Duration,
    /// Raise per-result handling diagnostics from debug to info.
    pub print_rpc_handle_info: bool,
    /// Raise stream dispatch/leave diagnostics from debug to info.
    pub print_stream_dispatch_info: bool,
    /// Log server-list refreshes verbosely.
    pub print_svr_list_update_info: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            fetch_log_rpc_timeout: Duration::from_secs(15),
            progress_limit_for_dml: Duration::from_secs(300),
            progress_limit_for_ddl: Duration::from_secs(3600),
            blacklist_survival_time: Duration::from_secs(60),
            check_switch_server_interval: Duration::from_secs(30 * 60),
            print_rpc_handle_info: false,
            print_stream_dispatch_info: false,
            print_svr_list_update_info: false,
        }
    }
}

impl FetchConfig {
    /// The flow-control window for a stream of the given type.
    pub fn progress_window(&self, stype: FetchStreamType) -> Duration {
        if stype.is_sys_ls() {
            self.progress_limit_for_ddl
        } else {
            self.progress_limit_for_dml
        }
    }
}

/// Hot-reloadable configuration cell.
///
/// Readers call [`ConfigCell::snapshot`] once per processing pass and keep
/// using that `Arc` for the whole pass; writers replace the snapshot
/// wholesale with [`ConfigCell::store`].
#[derive(Debug)]
pub struct ConfigCell {
    inner: RwLock<Arc<FetchConfig>>,
}

impl ConfigCell {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<FetchConfig> {
        Arc::clone(&self.inner.read())
    }

    pub fn store(&self, config: FetchConfig) {
        *self.inner.write() = Arc::new(config);
    }
}

impl Default for ConfigCell {
    fn default() -> Self {
        Self::new(FetchConfig::default())
    }
}
