//! Log sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position within a replicated log stream.
///
/// Opaque above the transport layer: the fetch engine only compares, orders,
/// and forwards LSNs. `Lsn::MIN` and `Lsn::MAX` act as sentinels for
/// "before everything" and "after everything".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Lsn(u64);

impl Lsn {
    pub const MIN: Lsn = Lsn(u64::MIN);
    pub const MAX: Lsn = Lsn(u64::MAX);

    pub const fn new(val: u64) -> Self {
        Lsn(val)
    }

    pub const fn val(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LSN({})", self.0)
    }
}
