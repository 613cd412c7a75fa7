//! Per-pass failover decisions.
//!
//! A processing pass accumulates at most one kick-out decision per stream.
//! The first reason recorded wins; later attempts within the same pass are
//! no-ops, so the earliest observed failure determines how the task is
//! reassigned.

use logcdc_core::TenantLsId;

/// Why a stream stops using its current server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KickOutReason {
    None,
    /// The fetch RPC itself failed.
    FetchLogFailOnRpc,
    /// The server answered the fetch RPC with an error.
    FetchLogFailOnServer,
    /// Missing-log backfill could not be completed on this server.
    MissingLogFetchFail,
    /// The server is a follower lagging behind the leader.
    LaggedFollower,
    /// The server no longer holds the requested log range.
    LogNotInThisServer,
    /// The log stream went offline on this server.
    LogStreamOfflined,
    /// No progress within the configured budget.
    ProgressTimeout,
    /// No progress within the (larger) budget granted to lagged replicas.
    ProgressTimeoutOnLaggedReplica,
    /// A higher-priority server became available; voluntary switch.
    NeedSwitchServer,
    /// The partition task was discarded while fetching.
    Discarded,
}

impl KickOutReason {
    /// Every kick-out blacklists the server except a voluntary switch and a
    /// discarded task.
    pub fn needs_blacklist(self) -> bool {
        !matches!(
            self,
            KickOutReason::NeedSwitchServer | KickOutReason::Discarded
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KickOutReason::None => "None",
            KickOutReason::FetchLogFailOnRpc => "FetchLogFailOnRpc",
            KickOutReason::FetchLogFailOnServer => "FetchLogFailOnServer",
            KickOutReason::MissingLogFetchFail => "MissingLogFetchFail",
            KickOutReason::LaggedFollower => "LaggedFollower",
            KickOutReason::LogNotInThisServer => "LogNotInThisServer",
            KickOutReason::LogStreamOfflined => "LogStreamOfflined",
            KickOutReason::ProgressTimeout => "ProgressTimeout",
            KickOutReason::ProgressTimeoutOnLaggedReplica => "ProgressTimeoutOnLaggedReplica",
            KickOutReason::NeedSwitchServer => "NeedSwitchServer",
            KickOutReason::Discarded => "Discarded",
        }
    }

    /// All reasons, for exhaustive policy checks.
    pub const ALL: [KickOutReason; 11] = [
        KickOutReason::None,
        KickOutReason::FetchLogFailOnRpc,
        KickOutReason::FetchLogFailOnServer,
        KickOutReason::MissingLogFetchFail,
        KickOutReason::LaggedFollower,
        KickOutReason::LogNotInThisServer,
        KickOutReason::LogStreamOfflined,
        KickOutReason::ProgressTimeout,
        KickOutReason::ProgressTimeoutOnLaggedReplica,
        KickOutReason::NeedSwitchServer,
        KickOutReason::Discarded,
    ];
}

/// Outcome of recording a kick-out reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Recorded,
    /// A reason was already recorded this pass; nothing changed.
    AlreadyExists,
}

/// At most one kick-out decision for one stream in one processing pass.
#[derive(Debug, Clone)]
pub struct KickOutInfo {
    tls_id: TenantLsId,
    reason: KickOutReason,
}

impl KickOutInfo {
    pub fn new(tls_id: TenantLsId) -> Self {
        Self {
            tls_id,
            reason: KickOutReason::None,
        }
    }

    /// Record a reason. The first call wins; every later call in the same
    /// pass reports [`SetOutcome::AlreadyExists`] and changes nothing.
    pub fn set(&mut self, reason: KickOutReason) -> SetOutcome {
        debug_assert!(reason != KickOutReason::None);
        if self.reason != KickOutReason::None {
            SetOutcome::AlreadyExists
        } else {
            self.reason = reason;
            SetOutcome::Recorded
        }
    }

    pub fn tls_id(&self) -> TenantLsId {
        self.tls_id
    }

    pub fn reason(&self) -> KickOutReason {
        self.reason
    }

    pub fn need_kick_out(&self) -> bool {
        self.reason != KickOutReason::None
    }
}
