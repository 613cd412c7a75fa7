//! Per-stream log fetch engine for the logcdc CDC client.
//!
//! The engine continuously pulls redo-log entries from a replicated log
//! service, one stream per tenant partition, and feeds decoded work to the
//! downstream parser through the partition task.
//!
//! ```text
//! StreamWorkerPool ──dispatch──> FetchStream ──async rounds──> AsyncFetchChannel ──> LogRpc
//!                                    │   │
//!                  MissLogResolver <─┘   └─> LsFetchCtx (decode, progress, sync)
//!                                                │
//!                        ProgressController <────┘ (global minimum progress)
//! ```
//!
//! A stream hibernates when flow control says it is far enough ahead, and
//! kicks its task out to another server when the current one fails, lags,
//! stalls, or loses the stream — blacklisting it for a while in all but the
//! voluntary cases.

pub mod blacklist;
pub mod channel;
pub mod config;
pub mod error;
pub mod kick_out;
pub mod missing;
pub mod resolver;
pub mod rpc;
pub mod stats;
pub mod stream;
pub mod traits;

pub use blacklist::ServerBlacklist;
pub use channel::{AsyncFetchChannel, FetchResult, RpcStopReason, MAX_RESULTS_PER_REQUEST};
pub use config::{ConfigCell, FetchConfig};
pub use error::{FetchError, Result};
pub use kick_out::{KickOutInfo, KickOutReason, SetOutcome};
pub use missing::MissingLogInfo;
pub use resolver::{MissLogResolver, MAX_MISS_LOG_PER_RPC};
pub use rpc::{
    FeedbackCode, FetchLogRequest, FetchLogResponse, FetchMissLogRequest, FetchMissLogResponse,
    FetchStatus, LogRpc,
};
pub use stats::{FetchStatInfo, StatTracker, TransStatInfo};
pub use stream::{FetchStream, FetchStreamRef};
pub use traits::{FetchTimeout, LsFetchCtx, ProgressController, StreamWaker, StreamWorkerPool};

/// Cooperative stop signal checked at loop boundaries.
pub use tokio_util::sync::CancellationToken as StopFlag;
