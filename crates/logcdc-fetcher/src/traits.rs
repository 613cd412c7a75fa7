//! Collaborator seams of the fetch engine.
//!
//! The engine owns policy; everything that touches shared infrastructure
//! sits behind one of these traits: the worker pool that schedules stream
//! passes, the controller that aggregates progress across streams, and the
//! per-partition task that parses entries and talks to downstream.
//!
//! ## Re-entrancy contract
//!
//! `dispatch_*` and `hibernate_*` enqueue work; they must never call back
//! into the stream synchronously. A stream handed over through one of them
//! belongs to the receiving context, and the handing context may not touch
//! it again.

use crate::error::Result;
use crate::missing::MissingLogInfo;
use crate::stats::TransStatInfo;
use crate::stream::FetchStreamRef;
use crate::StopFlag;
use async_trait::async_trait;
use bytes::Bytes;
use logcdc_core::{FetchStreamType, GroupEntry, LogEntry, Lsn, Progress, TenantLsId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Scheduling primitives of the stream worker pool.
#[async_trait]
pub trait StreamWorkerPool: Send + Sync {
    /// Hand a stream to a worker for one `handle` pass.
    async fn dispatch_stream_task(&self, stream: FetchStreamRef, reason: &'static str)
        -> Result<()>;

    /// Park a stream until the pool's wake-up timer re-dispatches it.
    async fn hibernate_stream_task(
        &self,
        stream: FetchStreamRef,
        reason: &'static str,
    ) -> Result<()>;

    /// Hand a kicked-out partition task back for server reassignment.
    async fn dispatch_fetch_task(
        &self,
        task: Arc<dyn LsFetchCtx>,
        reason: &'static str,
    ) -> Result<()>;

    /// When the fetcher last resumed from a global pause, if ever.
    fn fetcher_resume_tstamp(&self) -> Option<Instant>;
}

/// Re-dispatch hook the RPC completion path fires when an in-flight request
/// finishes while the worker side may already have left the stream.
#[async_trait]
pub trait StreamWaker: Send + Sync {
    async fn wake(&self, reason: &'static str);
}

/// Aggregated progress across every live stream.
#[async_trait]
pub trait ProgressController: Send + Sync {
    /// Global minimum progress; the base of every flow-control ceiling.
    async fn min_progress(&self) -> Result<Progress>;

    /// Publish one stream's progress under its progress id. Must only
    /// reflect fully applied group entries.
    async fn update_progress(&self, progress_id: u64, progress: Progress) -> Result<()>;
}

/// Outcome of a fetch-timeout probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTimeout {
    pub timed_out: bool,
    /// The budget that ran out was the lagged-replica grace period.
    pub on_lagged_replica: bool,
}

/// The per-partition fetch task.
///
/// A task is handed to exactly one stream at a time via
/// [`dispatch_in_fetch_stream`](LsFetchCtx::dispatch_in_fetch_stream); after
/// the handoff the dispatching side may not touch it.
#[async_trait]
pub trait LsFetchCtx: Send + Sync {
    fn tls_id(&self) -> TenantLsId;

    fn fetch_stream_type(&self) -> FetchStreamType;

    /// Where the next fetch request starts.
    fn next_lsn(&self) -> Lsn;

    fn progress(&self) -> Progress;

    /// Key under which this task publishes progress to the controller.
    fn progress_id(&self) -> u64;

    fn is_in_fetching_log(&self) -> bool;

    /// Must be called before a kicked-out task is handed back, so a stale
    /// stream cannot pick it up while it re-enters the idle pool.
    fn set_not_in_fetching_log(&self);

    /// Bind the task to `stream` on `svr` and mark it in-fetching.
    fn dispatch_in_fetch_stream(&self, svr: SocketAddr, stream: FetchStreamRef);

    fn is_discarded(&self) -> bool;

    /// When `svr` started serving this task; basis of the blacklist
    /// service-time measurement.
    fn cur_svr_start_fetch_tstamp(&self, svr: &SocketAddr) -> Result<Instant>;

    fn add_into_blacklist(
        &self,
        svr: SocketAddr,
        service_time: Duration,
        survival_time: Duration,
    ) -> Result<()>;

    /// Probe whether fetching on `svr` has gone too long without progress.
    /// `resume_tstamp` excludes time the whole fetcher was paused.
    fn check_fetch_timeout(
        &self,
        svr: &SocketAddr,
        upper_limit: Progress,
        resume_tstamp: Option<Instant>,
    ) -> Result<FetchTimeout>;

    /// Whether a higher-priority server than `svr` is available.
    fn need_switch_server(&self, svr: &SocketAddr) -> bool;

    fn need_update_svr_list(&self) -> bool;

    async fn update_svr_list(&self, verbose: bool) -> Result<()>;

    /// Progress clamped by flow control is not a stall; refresh the
    /// liveness timestamp when progress already sits beyond `upper_limit`.
    fn update_touch_tstamp_if_beyond(&self, upper_limit: Progress);

    /// Feed one response's serialized group entries to the decoder.
    fn append_log(&self, buf: Bytes) -> Result<()>;

    /// Next decoded group entry from previously appended buffers, `None`
    /// when the current buffer is exhausted.
    fn next_group_entry(&self) -> Result<Option<GroupEntry>>;

    /// Consume one log entry. A missing reference is reported by filling
    /// `missing` and returning [`FetchError::MissingLogs`]; a position the
    /// server no longer agrees on is [`FetchError::LogNotSync`].
    ///
    /// [`FetchError::MissingLogs`]: crate::FetchError::MissingLogs
    /// [`FetchError::LogNotSync`]: crate::FetchError::LogNotSync
    async fn read_log(
        &self,
        entry: &LogEntry,
        lsn: Lsn,
        missing: &mut MissingLogInfo,
        tsi: &mut TransStatInfo,
        stop: &StopFlag,
    ) -> Result<()>;

    /// Consume one backfilled entry during missing-log resolution. Newly
    /// discovered references go into `discovered` for the next round.
    async fn read_miss_tx_log(
        &self,
        entry: &LogEntry,
        lsn: Lsn,
        tsi: &mut TransStatInfo,
        discovered: &mut MissingLogInfo,
    ) -> Result<()>;

    /// Advance progress past a fully consumed group entry.
    fn update_progress(&self, group: &GroupEntry, start_lsn: Lsn) -> Result<()>;

    /// Flush decoded work downstream and push a progress heartbeat.
    async fn sync(&self, stop: &StopFlag) -> Result<()>;
}
