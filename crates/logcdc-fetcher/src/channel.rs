//! Per-stream async fetch RPC channel.
//!
//! At most one fetch request is in flight per stream. A request is a
//! *generation*: `prepare_request` opens one, `discard_request` closes it,
//! and every result carries the generation it was produced under — results
//! from a superseded generation are dropped unseen. One request streams
//! multiple rounds; `update_request` adjusts the parameters the next round
//! will use without discarding the request.
//!
//! ## Ownership
//!
//! The spawned request task is the "RPC completion path" of the ownership
//! protocol: when its rounds finish it flips the in-flight flag off and
//! fires the stream's waker, so a stream that was left in `FETCH_LOG` under
//! RPC ownership gets re-dispatched to the worker pool.

use crate::error::{FetchError, Result};
use crate::rpc::{FeedbackCode, FetchLogRequest, FetchLogResponse, LogRpc};
use crate::traits::StreamWaker;
use logcdc_core::{Lsn, Progress, TenantLsId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tonic::Status;
use tracing::{debug, warn};

/// Cap on buffered results per request; the request task stops streaming
/// rounds once the queue is this deep.
pub const MAX_RESULTS_PER_REQUEST: usize = 16;

const RESULT_POOL_CAP: usize = 8;

/// Why the in-flight request stopped issuing further rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcStopReason {
    /// The server reached the flow-control ceiling.
    ReachUpperLimit,
    /// The server served its last known log.
    ReachMaxLsn,
    /// The round fetched nothing.
    FetchNoLog,
    /// The result queue hit [`MAX_RESULTS_PER_REQUEST`].
    ReachMaxRpcResult,
    /// The round failed or the server reported a problem.
    FetchFail,
    /// `mark_request_stop` or `discard_request` took effect.
    ForceStop,
}

/// One completed round of the async fetch RPC.
#[derive(Debug)]
pub struct FetchResult {
    generation: u64,
    /// RPC-level failure, if any; `resp` is meaningless when set.
    pub rcode: Option<Status>,
    pub resp: FetchLogResponse,
    pub rpc_time: Duration,
    pub rpc_callback_time: Duration,
    /// This result was the request's last round.
    pub stop_upon_result: bool,
    pub stop_reason: Option<RpcStopReason>,
}

impl FetchResult {
    fn blank() -> Self {
        Self {
            generation: 0,
            rcode: None,
            resp: FetchLogResponse::default(),
            rpc_time: Duration::ZERO,
            rpc_callback_time: Duration::ZERO,
            stop_upon_result: false,
            stop_reason: None,
        }
    }

    fn reset(&mut self) {
        self.generation = 0;
        self.rcode = None;
        self.resp = FetchLogResponse::default();
        self.rpc_time = Duration::ZERO;
        self.rpc_callback_time = Duration::ZERO;
        self.stop_upon_result = false;
        self.stop_reason = None;
    }
}

#[derive(Debug, Clone)]
struct RequestState {
    tls_id: TenantLsId,
    upper_limit: Progress,
    timeout: Duration,
    stopped: bool,
}

struct ChannelInner {
    svr: Option<SocketAddr>,
    generation: u64,
    req: Option<RequestState>,
    queue: VecDeque<FetchResult>,
    flying_generation: Option<u64>,
    pool: Vec<FetchResult>,
}

/// Per-stream abstraction over the streaming fetch RPC.
pub struct AsyncFetchChannel {
    rpc: Arc<dyn LogRpc>,
    inner: Arc<Mutex<ChannelInner>>,
}

impl AsyncFetchChannel {
    pub fn new(rpc: Arc<dyn LogRpc>) -> Self {
        Self {
            rpc,
            inner: Arc::new(Mutex::new(ChannelInner {
                svr: None,
                generation: 0,
                req: None,
                queue: VecDeque::new(),
                flying_generation: None,
                pool: Vec::new(),
            })),
        }
    }

    pub fn set_server(&self, svr: SocketAddr) {
        self.inner.lock().svr = Some(svr);
    }

    pub fn server(&self) -> Option<SocketAddr> {
        self.inner.lock().svr
    }

    /// Open a fresh request generation, invalidating any prior one.
    pub fn prepare_request(&self, tls_id: TenantLsId, timeout: Duration) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.flying_generation = None;
        inner.queue.clear();
        inner.req = Some(RequestState {
            tls_id,
            upper_limit: Progress::INVALID,
            timeout,
            stopped: false,
        });
    }

    /// Adjust the in-flight request's parameters for its next round.
    pub fn update_request(&self, upper_limit: Progress, timeout: Duration) {
        let mut inner = self.inner.lock();
        if let Some(req) = inner.req.as_mut() {
            req.upper_limit = upper_limit;
            req.timeout = timeout;
        }
    }

    /// Ask the request task to stop streaming further rounds. Buffered
    /// results stay available.
    pub fn mark_request_stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(req) = inner.req.as_mut() {
            req.stopped = true;
        }
    }

    /// Invalidate the current request generation; late results from it are
    /// dropped unseen.
    pub fn discard_request(&self, reason: &'static str, is_normal: bool) {
        let mut inner = self.inner.lock();
        if inner.req.is_none() {
            return;
        }
        if is_normal {
            debug!(reason, "discard fetch request");
        } else {
            warn!(reason, "discard fetch request");
        }
        inner.generation += 1;
        inner.req = None;
        inner.flying_generation = None;
        inner.queue.clear();
    }

    /// Fire one asynchronous fetch request. Returns whether dispatch itself
    /// succeeded; a synchronous dispatch failure is also surfaced as an
    /// error result in the queue so the normal result path records it.
    pub fn async_fetch_log(
        &self,
        start_lsn: Lsn,
        upper_limit: Progress,
        waker: Arc<dyn StreamWaker>,
    ) -> Result<bool> {
        let (svr, tls_id, generation) = {
            let mut inner = self.inner.lock();
            let generation = inner.generation;
            let Some(req) = inner.req.as_mut() else {
                return Err(FetchError::StateMismatch {
                    expected: "prepared request",
                    actual: "none",
                });
            };
            req.upper_limit = upper_limit;
            let tls_id = req.tls_id;

            let Some(svr) = inner.svr else {
                let mut result = FetchResult::blank();
                result.generation = generation;
                result.rcode = Some(Status::unavailable("no server bound to fetch stream"));
                result.stop_upon_result = true;
                result.stop_reason = Some(RpcStopReason::FetchFail);
                inner.queue.push_back(result);
                return Ok(false);
            };

            inner.flying_generation = Some(generation);
            (svr, tls_id, generation)
        };

        let rpc = Arc::clone(&self.rpc);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(run_request(
            rpc, inner, waker, svr, tls_id, start_lsn, generation,
        ));
        Ok(true)
    }

    /// Pop the next buffered result. `None` means the queue is drained;
    /// the flag reports whether the request is still producing rounds.
    pub fn next_result(&self) -> (Option<FetchResult>, bool) {
        let mut inner = self.inner.lock();
        let current = inner.generation;
        let in_flight = inner.flying_generation == Some(current);
        while let Some(result) = inner.queue.pop_front() {
            if result.generation == current {
                return (Some(result), in_flight);
            }
            // Superseded generation; drop silently.
        }
        (None, in_flight)
    }

    /// Return a consumed result's buffers to the channel's pool.
    pub fn revert_result(&self, mut result: FetchResult) {
        let mut inner = self.inner.lock();
        if inner.pool.len() < RESULT_POOL_CAP {
            result.reset();
            inner.pool.push(result);
        }
    }
}

async fn run_request(
    rpc: Arc<dyn LogRpc>,
    inner: Arc<Mutex<ChannelInner>>,
    waker: Arc<dyn StreamWaker>,
    svr: SocketAddr,
    tls_id: TenantLsId,
    start_lsn: Lsn,
    generation: u64,
) {
    let mut next_lsn = start_lsn;
    loop {
        let params = {
            let inner = inner.lock();
            if inner.generation != generation {
                return; // superseded while waiting; nothing to report
            }
            match &inner.req {
                Some(req) if !req.stopped => Some((req.upper_limit, req.timeout)),
                _ => None,
            }
        };
        let Some((upper_limit, timeout)) = params else {
            finish_request(&inner, generation);
            waker.wake("RpcForceStop").await;
            return;
        };

        let rpc_started = Instant::now();
        let outcome = rpc
            .fetch_log(
                svr,
                FetchLogRequest {
                    tls_id,
                    start_lsn: next_lsn,
                    upper_limit,
                    timeout,
                },
            )
            .await;
        let rpc_time = rpc_started.elapsed();

        let callback_started = Instant::now();
        let stop = {
            let mut inner = inner.lock();
            if inner.generation != generation {
                return;
            }
            let mut result = inner.pool.pop().unwrap_or_else(FetchResult::blank);
            result.generation = generation;
            result.rpc_time = rpc_time;

            let stop_reason = match outcome {
                Err(status) => {
                    result.rcode = Some(status);
                    Some(RpcStopReason::FetchFail)
                }
                Ok(resp) => {
                    let reason = if resp.err != 0 || resp.feedback != FeedbackCode::None {
                        Some(RpcStopReason::FetchFail)
                    } else if resp.log_num == 0 {
                        Some(RpcStopReason::FetchNoLog)
                    } else if resp.reached_upper_limit {
                        Some(RpcStopReason::ReachUpperLimit)
                    } else if resp.reached_end {
                        Some(RpcStopReason::ReachMaxLsn)
                    } else if inner.queue.len() + 1 >= MAX_RESULTS_PER_REQUEST {
                        Some(RpcStopReason::ReachMaxRpcResult)
                    } else {
                        None
                    };
                    next_lsn = resp.next_req_lsn;
                    result.resp = resp;
                    reason
                }
            };

            result.stop_upon_result = stop_reason.is_some();
            result.stop_reason = stop_reason;
            result.rpc_callback_time = callback_started.elapsed();
            inner.queue.push_back(result);
            stop_reason.is_some()
        };

        if stop {
            finish_request(&inner, generation);
            waker.wake("RpcCallback").await;
            return;
        }
    }
}

fn finish_request(inner: &Mutex<ChannelInner>, generation: u64) {
    let mut inner = inner.lock();
    if inner.flying_generation == Some(generation) {
        inner.flying_generation = None;
    }
}
