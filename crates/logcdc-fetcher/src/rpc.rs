//! RPC surface of the fetch engine.
//!
//! Transport and wire encoding live behind [`LogRpc`]; the engine only sees
//! typed requests and responses. RPC-level failures are `tonic::Status`,
//! classified upstream into kick-out decisions.

use async_trait::async_trait;
use bytes::Bytes;
use logcdc_core::{LogEntry, Lsn, Progress, TenantLsId};
use std::net::SocketAddr;
use std::time::Duration;
use tonic::Status;

/// Server feedback piggybacked on a fetch response. Anything other than
/// `None` invalidates the stream on this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackCode {
    #[default]
    None,
    /// The server is a follower lagging behind the leader.
    LaggedFollower,
    /// The requested range is not served here.
    LogNotInThisServer,
    /// The log stream went offline on this server.
    LsOfflined,
}

/// Server-side timing breakdown for one fetch round.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStatus {
    pub l2s_net_time: Duration,
    pub svr_queue_time: Duration,
    pub svr_process_time: Duration,
}

/// One round of the streaming fetch-log RPC.
#[derive(Debug, Clone)]
pub struct FetchLogRequest {
    pub tls_id: TenantLsId,
    pub start_lsn: Lsn,
    /// Flow-control ceiling; the server stops before crossing it.
    pub upper_limit: Progress,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FetchLogResponse {
    /// Server-side error code; zero is success.
    pub err: i32,
    pub feedback: FeedbackCode,
    /// Serialized group entries, decoded by the partition task.
    pub entry_buf: Bytes,
    /// Number of group entries in `entry_buf`.
    pub log_num: u32,
    /// Where the next round should start.
    pub next_req_lsn: Lsn,
    /// The server hit the requested upper limit.
    pub reached_upper_limit: bool,
    /// The server served its last known log.
    pub reached_end: bool,
    pub status: FetchStatus,
}

impl Default for FetchLogResponse {
    fn default() -> Self {
        Self {
            err: 0,
            feedback: FeedbackCode::None,
            entry_buf: Bytes::new(),
            log_num: 0,
            next_req_lsn: Lsn::MIN,
            reached_upper_limit: false,
            reached_end: false,
            status: FetchStatus::default(),
        }
    }
}

/// Batched out-of-band fetch of missing log entries.
#[derive(Debug, Clone)]
pub struct FetchMissLogRequest {
    pub tls_id: TenantLsId,
    /// Sorted, deduplicated LSNs to backfill, in request order.
    pub miss_lsns: Vec<Lsn>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct FetchMissLogResponse {
    /// Server-side error code; zero is success.
    pub err: i32,
    /// Watermark: the last requested LSN the server consumed. Must equal
    /// the batch boundary, or the response is a protocol violation.
    pub next_miss_lsn: Lsn,
    /// One entry per served LSN, in request order.
    pub entries: Vec<LogEntry>,
}

/// Client side of the log service protocol.
#[async_trait]
pub trait LogRpc: Send + Sync {
    /// One round of the streaming fetch against `svr`.
    async fn fetch_log(
        &self,
        svr: SocketAddr,
        req: FetchLogRequest,
    ) -> std::result::Result<FetchLogResponse, Status>;

    /// Synchronous backfill of missing entries from `svr`. Blocks the
    /// calling worker until response or timeout.
    async fn fetch_missing_log(
        &self,
        svr: SocketAddr,
        req: FetchMissLogRequest,
    ) -> std::result::Result<FetchMissLogResponse, Status>;
}
