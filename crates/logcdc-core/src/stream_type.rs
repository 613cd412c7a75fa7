//! Fetch stream classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of log stream a fetch stream serves.
///
/// System streams carry DDL and tenant-level state and are flow-controlled
/// with a wider progress window than user DML streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchStreamType {
    /// Tenant system log stream (DDL and meta records).
    SysLs,
    /// User log stream fetched near the head.
    HotLog,
    /// User log stream fetched far behind the head.
    ColdLog,
}

impl FetchStreamType {
    pub fn is_sys_ls(self) -> bool {
        matches!(self, FetchStreamType::SysLs)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchStreamType::SysLs => "SYS_LS",
            FetchStreamType::HotLog => "HOT_LOG",
            FetchStreamType::ColdLog => "COLD_LOG",
        }
    }
}

impl fmt::Display for FetchStreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
