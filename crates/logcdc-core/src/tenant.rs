//! Tenant log-stream identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one replicated log stream: (tenant, log stream).
///
/// Exactly one fetch stream exists per active `TenantLsId` at a time. The
/// total order is only used for stable diagnostics output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TenantLsId {
    tenant_id: u64,
    ls_id: i64,
}

impl TenantLsId {
    pub const fn new(tenant_id: u64, ls_id: i64) -> Self {
        Self { tenant_id, ls_id }
    }

    pub const fn tenant_id(self) -> u64 {
        self.tenant_id
    }

    pub const fn ls_id(self) -> i64 {
        self.ls_id
    }

    /// Tenant zero is reserved and never carries a log stream.
    pub fn is_valid(self) -> bool {
        self.tenant_id != 0
    }
}

impl fmt::Display for TenantLsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tenant_id, self.ls_id)
    }
}
