//! Fetch throughput accounting.
//!
//! Counters are monotonic; reporting works on the delta between the current
//! window and the last one that was logged. Nothing here is
//! consistency-critical, so the tracker sits behind its own small lock and
//! never touches the stream's main state.

use crate::channel::RpcStopReason;
use logcdc_core::{FetchStreamType, TenantLsId};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Decoded-transaction counters folded in from the partition task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransStatInfo {
    pub redo_cnt: u64,
    pub redo_size: u64,
    pub commit_cnt: u64,
    pub abort_cnt: u64,
}

impl TransStatInfo {
    pub fn fold(&mut self, other: &TransStatInfo) {
        self.redo_cnt += other.redo_cnt;
        self.redo_size += other.redo_size;
        self.commit_cnt += other.commit_cnt;
        self.abort_cnt += other.abort_cnt;
    }

    fn delta(&self, last: &TransStatInfo) -> TransStatInfo {
        TransStatInfo {
            redo_cnt: self.redo_cnt - last.redo_cnt,
            redo_size: self.redo_size - last.redo_size,
            commit_cnt: self.commit_cnt - last.commit_cnt,
            abort_cnt: self.abort_cnt - last.abort_cnt,
        }
    }
}

/// Monotonic per-stream fetch counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchStatInfo {
    pub fetch_log_cnt: u64,
    pub fetch_log_size: u64,

    pub fetch_log_rpc_cnt: u64,
    pub fetch_log_rpc_time: Duration,
    pub fetch_log_rpc_to_svr_net_time: Duration,
    pub fetch_log_rpc_svr_queue_time: Duration,
    pub fetch_log_rpc_svr_process_time: Duration,
    pub fetch_log_rpc_callback_time: Duration,

    pub handle_rpc_time: Duration,
    pub read_log_time: Duration,
    pub decode_log_entry_time: Duration,
    pub flush_time: Duration,

    /// Requests that stopped streaming after a single round, split by why.
    pub single_rpc_cnt: u64,
    pub reach_upper_limit_rpc_cnt: u64,
    pub reach_end_rpc_cnt: u64,
    pub no_log_rpc_cnt: u64,
    pub reach_max_result_rpc_cnt: u64,

    pub tsi: TransStatInfo,
}

impl FetchStatInfo {
    /// Record one round that stopped the request.
    pub fn record_stop_reason(&mut self, reason: RpcStopReason) {
        self.single_rpc_cnt += 1;
        match reason {
            RpcStopReason::ReachUpperLimit => self.reach_upper_limit_rpc_cnt += 1,
            RpcStopReason::ReachMaxLsn => self.reach_end_rpc_cnt += 1,
            RpcStopReason::FetchNoLog => self.no_log_rpc_cnt += 1,
            RpcStopReason::ReachMaxRpcResult => self.reach_max_result_rpc_cnt += 1,
            RpcStopReason::FetchFail | RpcStopReason::ForceStop => {}
        }
    }

    fn delta(&self, last: &FetchStatInfo) -> FetchStatInfo {
        FetchStatInfo {
            fetch_log_cnt: self.fetch_log_cnt - last.fetch_log_cnt,
            fetch_log_size: self.fetch_log_size - last.fetch_log_size,
            fetch_log_rpc_cnt: self.fetch_log_rpc_cnt - last.fetch_log_rpc_cnt,
            fetch_log_rpc_time: self.fetch_log_rpc_time - last.fetch_log_rpc_time,
            fetch_log_rpc_to_svr_net_time: self.fetch_log_rpc_to_svr_net_time
                - last.fetch_log_rpc_to_svr_net_time,
            fetch_log_rpc_svr_queue_time: self.fetch_log_rpc_svr_queue_time
                - last.fetch_log_rpc_svr_queue_time,
            fetch_log_rpc_svr_process_time: self.fetch_log_rpc_svr_process_time
                - last.fetch_log_rpc_svr_process_time,
            fetch_log_rpc_callback_time: self.fetch_log_rpc_callback_time
                - last.fetch_log_rpc_callback_time,
            handle_rpc_time: self.handle_rpc_time - last.handle_rpc_time,
            read_log_time: self.read_log_time - last.read_log_time,
            decode_log_entry_time: self.decode_log_entry_time - last.decode_log_entry_time,
            flush_time: self.flush_time - last.flush_time,
            single_rpc_cnt: self.single_rpc_cnt - last.single_rpc_cnt,
            reach_upper_limit_rpc_cnt: self.reach_upper_limit_rpc_cnt
                - last.reach_upper_limit_rpc_cnt,
            reach_end_rpc_cnt: self.reach_end_rpc_cnt - last.reach_end_rpc_cnt,
            no_log_rpc_cnt: self.no_log_rpc_cnt - last.no_log_rpc_cnt,
            reach_max_result_rpc_cnt: self.reach_max_result_rpc_cnt
                - last.reach_max_result_rpc_cnt,
            tsi: self.tsi.delta(&last.tsi),
        }
    }
}

#[derive(Debug, Default)]
struct StatWindow {
    cur: FetchStatInfo,
    last: FetchStatInfo,
    last_stat_time: Option<Instant>,
}

/// Stream statistics behind their own lock, so reporting never contends
/// with the fetch path's main state.
#[derive(Debug, Default)]
pub struct StatTracker {
    window: Mutex<StatWindow>,
}

impl StatTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutate the current counters.
    pub fn apply<F: FnOnce(&mut FetchStatInfo)>(&self, f: F) {
        let mut window = self.window.lock();
        f(&mut window.cur);
    }

    /// Snapshot of the current counters.
    pub fn current(&self) -> FetchStatInfo {
        self.window.lock().cur
    }

    /// Log per-second rates since the previous call, then roll the window.
    /// Windows too short to divide are skipped.
    pub fn log_rates(&self, svr: Option<SocketAddr>, stype: FetchStreamType, tls_id: TenantLsId) {
        let mut window = self.window.lock();
        let now = Instant::now();

        let Some(last_time) = window.last_stat_time else {
            window.last_stat_time = Some(now);
            window.last = window.cur;
            return;
        };

        let delta_seconds = (now - last_time).as_secs_f64();
        if delta_seconds <= f64::EPSILON {
            return;
        }

        let delta = window.cur.delta(&window.last);
        let rpc_cnt = delta.fetch_log_rpc_cnt.max(1);
        info!(
            stream = %tls_id,
            svr = svr.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            stream_type = %stype,
            log_per_sec = delta.fetch_log_cnt as f64 / delta_seconds,
            mb_per_sec = delta.fetch_log_size as f64 / delta_seconds / 1_048_576.0,
            rpc_per_sec = delta.fetch_log_rpc_cnt as f64 / delta_seconds,
            avg_rpc_ms = delta.fetch_log_rpc_time.as_millis() as u64 / rpc_cnt,
            single_rpc = delta.single_rpc_cnt,
            reach_upper_limit = delta.reach_upper_limit_rpc_cnt,
            reach_end = delta.reach_end_rpc_cnt,
            no_log = delta.no_log_rpc_cnt,
            max_result = delta.reach_max_result_rpc_cnt,
            trans_commit = delta.tsi.commit_cnt,
            trans_abort = delta.tsi.abort_cnt,
            "fetch stream stat"
        );

        window.last_stat_time = Some(now);
        window.last = window.cur;
    }
}
