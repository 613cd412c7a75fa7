//! Per-log-stream fetch state machine.
//!
//! One `FetchStream` drives log fetching for a single (tenant, log stream)
//! pair: it decides when to fetch (flow control against the global minimum
//! progress), issues asynchronous fetch rounds through its
//! [`AsyncFetchChannel`], consumes results in arrival order, backfills
//! missing references through the [`MissLogResolver`], and accumulates at
//! most one kick-out decision per pass.
//!
//! ## States
//!
//! ```text
//!          ┌────────────────────── hibernate / leave ──────────────┐
//!          ▼                                                       │
//!      ┌──────┐  behind upper limit, async fetch sent        ┌───────────┐
//!      │ IDLE │ ───────────────────────────────────────────> │ FETCH_LOG │
//!      └──────┘                                              └───────────┘
//!          ▲      queue drained, no kick-out, no hibernation       │
//!          └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//!
//! Exactly one logical owner mutates a stream at any instant. Ownership
//! moves at explicit handoff points: dispatching to the pool, hibernating,
//! and a successful async send all relinquish the stream, and the handing
//! context must not touch it afterwards. The `FetchStreamRef` mutex is the
//! token backing that contract — only the context a stream was handed to
//! locks it.

use crate::channel::{AsyncFetchChannel, FetchResult};
use crate::config::{ConfigCell, FetchConfig};
use crate::error::{FetchError, Result};
use crate::kick_out::{KickOutInfo, KickOutReason};
use crate::missing::MissingLogInfo;
use crate::resolver::MissLogResolver;
use crate::rpc::{FeedbackCode, FetchLogResponse, LogRpc};
use crate::stats::{StatTracker, TransStatInfo};
use crate::traits::{LsFetchCtx, ProgressController, StreamWaker, StreamWorkerPool};
use crate::StopFlag;
use async_trait::async_trait;
use logcdc_core::{FetchStreamType, Progress};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Shared handle to a stream; the dispatch currency between the worker
/// pool and the RPC completion path.
pub type FetchStreamRef = Arc<Mutex<FetchStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    FetchLog,
}

/// What a pass decided to do next.
enum Step {
    /// Run the next state within the same pass (trampoline, not recursion).
    Continue,
    /// Ownership left this context.
    Leave,
    /// Park until the pool's timer wakes the stream.
    Hibernate,
    /// Stop using the current server and hand the task back.
    KickOut(KickOutReason),
}

#[derive(Debug, Clone, Copy)]
struct ResultOutcome {
    stream_valid: bool,
    invalid_reason: &'static str,
    hibernate: bool,
}

impl ResultOutcome {
    fn valid(hibernate: bool) -> Self {
        Self {
            stream_valid: true,
            invalid_reason: "",
            hibernate,
        }
    }

    fn invalid(reason: &'static str) -> Self {
        Self {
            stream_valid: false,
            invalid_reason: reason,
            hibernate: false,
        }
    }
}

/// Time spent in the sub-steps of handling one result.
#[derive(Debug, Default)]
struct PassTimings {
    read_log_time: Duration,
    decode_time: Duration,
    flush_time: Duration,
    tsi: TransStatInfo,
}

pub struct FetchStream {
    tenant_id: u64,
    stype: FetchStreamType,
    task: Arc<dyn LsFetchCtx>,
    rpc: Arc<dyn LogRpc>,
    svr: Option<SocketAddr>,
    state: State,
    upper_limit: Progress,
    last_switch_server_check: Option<Instant>,
    chan: AsyncFetchChannel,
    pool: Arc<dyn StreamWorkerPool>,
    progress_controller: Arc<dyn ProgressController>,
    config: Arc<ConfigCell>,
    stats: Arc<StatTracker>,
}

impl std::fmt::Debug for FetchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchStream")
            .field("tenant_id", &self.tenant_id)
            .field("stype", &self.stype)
            .field("svr", &self.svr)
            .field("state", &self.state)
            .field("upper_limit", &self.upper_limit)
            .finish_non_exhaustive()
    }
}

impl FetchStream {
    /// Create a stream bound to `task`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the tenant id is reserved or `stype` does not
    /// match the task's stream type.
    pub fn new(
        tenant_id: u64,
        task: Arc<dyn LsFetchCtx>,
        stype: FetchStreamType,
        rpc: Arc<dyn LogRpc>,
        pool: Arc<dyn StreamWorkerPool>,
        progress_controller: Arc<dyn ProgressController>,
        config: Arc<ConfigCell>,
    ) -> Result<FetchStreamRef> {
        if tenant_id == 0 {
            return Err(FetchError::InvalidArgument("tenant id must be non-zero"));
        }
        if task.fetch_stream_type() != stype {
            return Err(FetchError::InvalidArgument(
                "stream type does not match the task",
            ));
        }

        let chan = AsyncFetchChannel::new(Arc::clone(&rpc));
        Ok(Arc::new(Mutex::new(Self {
            tenant_id,
            stype,
            task,
            rpc,
            svr: None,
            state: State::Idle,
            upper_limit: Progress::INVALID,
            last_switch_server_check: None,
            chan,
            pool,
            progress_controller,
            config,
            stats: Arc::new(StatTracker::new()),
        })))
    }

    /// Bind `svr`, mark the task in-fetching, and hand the stream to the
    /// worker pool. The caller must not touch the stream afterwards.
    pub async fn prepare_to_fetch(this: &FetchStreamRef, svr: SocketAddr) -> Result<()> {
        let pool = {
            let mut stream = this.lock().await;
            stream.chan.set_server(svr);
            stream.svr = Some(svr);
            stream.task.dispatch_in_fetch_stream(svr, Arc::clone(this));
            info!(
                stream = %stream.task.tls_id(),
                %svr,
                stream_type = %stream.stype,
                "prepare to fetch logs"
            );
            Arc::clone(&stream.pool)
        };
        pool.dispatch_stream_task(Arc::clone(this), "DispatchServer")
            .await
    }

    /// Drive one processing pass. Dispatched by the worker pool or by the
    /// RPC completion path; re-entrant across dispatches, single-owner
    /// within one.
    pub async fn handle(this: &FetchStreamRef, stop: &StopFlag) -> Result<()> {
        let mut stream = this.lock().await;
        let cfg = stream.config.snapshot();

        if cfg.print_stream_dispatch_info {
            info!(
                tenant = stream.tenant_id,
                stream = %stream.task.tls_id(),
                state = stream.state_name(),
                "begin handle"
            );
        } else {
            debug!(
                tenant = stream.tenant_id,
                stream = %stream.task.tls_id(),
                state = stream.state_name(),
                "begin handle"
            );
        }

        loop {
            let step = match stream.state {
                State::Idle => stream.handle_idle(&cfg, this).await?,
                State::FetchLog => stream.handle_fetch_log(&cfg, stop).await?,
            };
            match step {
                Step::Continue => {}
                Step::Leave => return Ok(()),
                Step::Hibernate => {
                    let pool = Arc::clone(&stream.pool);
                    drop(stream);
                    return pool
                        .hibernate_stream_task(Arc::clone(this), "FetchStream")
                        .await;
                }
                Step::KickOut(reason) => {
                    return stream.kick_out_task(&cfg, reason).await;
                }
            }
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::Idle => "IDLE",
            State::FetchLog => "FETCH_LOG",
        }
    }

    pub fn server(&self) -> Option<SocketAddr> {
        self.svr
    }

    pub fn upper_limit(&self) -> Progress {
        self.upper_limit
    }

    pub fn stats(&self) -> Arc<StatTracker> {
        Arc::clone(&self.stats)
    }

    /// Log windowed throughput for this stream.
    pub fn do_stat(&self) {
        self.stats.log_rates(self.svr, self.stype, self.task.tls_id());
    }

    async fn handle_idle(&mut self, cfg: &FetchConfig, this: &FetchStreamRef) -> Result<Step> {
        if self.state != State::Idle {
            return Err(FetchError::StateMismatch {
                expected: "IDLE",
                actual: self.state_name(),
            });
        }
        if !self.task.is_in_fetching_log() {
            self.leave_stream(cfg, "LsNotInFetchingState");
            return Ok(Step::Leave);
        }

        // Anything left from the previous ownership epoch is stale.
        self.chan.discard_request("HandleIdle", true);
        self.chan
            .prepare_request(self.task.tls_id(), cfg.fetch_log_rpc_timeout);

        self.upper_limit = self.compute_upper_limit(cfg).await?;
        if !self.need_fetch_log()? {
            return Ok(Step::Hibernate);
        }

        self.state = State::FetchLog;
        let next_lsn = self.task.next_lsn();
        let waker: Arc<dyn StreamWaker> = Arc::new(PoolWaker {
            pool: Arc::clone(&self.pool),
            stream: Arc::clone(this),
        });
        let sent = self.chan.async_fetch_log(next_lsn, self.upper_limit, waker)?;
        if sent {
            // The RPC completion path owns the stream until results land.
            self.leave_stream(cfg, "AsyncRpcSendSucc");
            Ok(Step::Leave)
        } else {
            // Dispatch failed synchronously; the failure sits in the result
            // queue, so fall straight into FETCH_LOG within this pass.
            Ok(Step::Continue)
        }
    }

    async fn handle_fetch_log(&mut self, cfg: &FetchConfig, stop: &StopFlag) -> Result<Step> {
        if self.state != State::FetchLog {
            return Err(FetchError::StateMismatch {
                expected: "FETCH_LOG",
                actual: self.state_name(),
            });
        }

        let mut kickout = KickOutInfo::new(self.task.tls_id());
        let mut need_hibernate = false;
        let mut taken_over_by_rpc = false;

        loop {
            if stop.is_cancelled() {
                return Err(FetchError::Stopped);
            }
            let (result, in_flight) = self.chan.next_result();
            let Some(result) = result else {
                taken_over_by_rpc = in_flight;
                break;
            };

            let outcome = self.process_result(&result, cfg, stop, &mut kickout).await;
            self.chan.revert_result(result);
            let outcome = outcome?;

            need_hibernate = outcome.hibernate;
            if !outcome.stream_valid {
                break;
            }
        }

        if taken_over_by_rpc {
            // Results are still being produced; the completion path will
            // re-dispatch this stream. Hands off from here.
            self.leave_stream(cfg, "RpcTakeOver");
            return Ok(Step::Leave);
        }

        self.state = State::Idle;
        if kickout.need_kick_out() {
            Ok(Step::KickOut(kickout.reason()))
        } else if need_hibernate {
            Ok(Step::Hibernate)
        } else {
            Ok(Step::Continue)
        }
    }

    async fn process_result(
        &mut self,
        result: &FetchResult,
        cfg: &FetchConfig,
        stop: &StopFlag,
        kickout: &mut KickOutInfo,
    ) -> Result<ResultOutcome> {
        let handle_started = Instant::now();
        let mut timings = PassTimings::default();

        let outcome = self
            .handle_fetch_log_result(result, cfg, stop, kickout, &mut timings)
            .await?;

        if !outcome.stream_valid {
            // Reopen from scratch next pass; late results are dropped.
            self.chan.discard_request(outcome.invalid_reason, false);
        } else {
            // Keep the in-flight request aligned with fresh flow control.
            self.update_rpc_request_params(cfg).await?;
        }

        self.update_fetch_stat_info(result, handle_started.elapsed(), &timings);
        self.print_handle_info(cfg, result, &outcome, kickout);
        Ok(outcome)
    }

    async fn handle_fetch_log_result(
        &mut self,
        result: &FetchResult,
        cfg: &FetchConfig,
        stop: &StopFlag,
        kickout: &mut KickOutInfo,
        timings: &mut PassTimings,
    ) -> Result<ResultOutcome> {
        if let Some(status) = &result.rcode {
            error!(
                stream = %self.task.tls_id(),
                svr = ?self.svr,
                %status,
                "fetch log fail on rpc"
            );
            kickout.set(KickOutReason::FetchLogFailOnRpc);
            return Ok(ResultOutcome::invalid("FetchLogFail"));
        }
        let resp = &result.resp;
        if resp.err != 0 {
            error!(
                stream = %self.task.tls_id(),
                svr = ?self.svr,
                svr_err = resp.err,
                "fetch log fail on server"
            );
            kickout.set(KickOutReason::FetchLogFailOnServer);
            return Ok(ResultOutcome::invalid("FetchLogFail"));
        }

        let read_started = Instant::now();
        match self.read_log(resp, cfg, stop, kickout, timings).await {
            Ok(()) => {
                timings.read_log_time += read_started.elapsed();
            }
            Err(FetchError::LogNotSync) => {
                // The server and this stream disagree on the position;
                // reopen rather than kick out.
                return Ok(ResultOutcome::invalid("LogNotSync"));
            }
            Err(e) => return Err(e),
        }

        self.check_feedback(resp, kickout);
        self.update_fetch_task_state(cfg, stop, kickout, timings)
            .await?;

        if kickout.need_kick_out() {
            return Ok(ResultOutcome::invalid("KickOutLs"));
        }
        Ok(ResultOutcome::valid(resp.log_num == 0))
    }

    /// Consume every group entry carried by one response, in order.
    /// Progress advances only after a group is fully consumed.
    async fn read_log(
        &mut self,
        resp: &FetchLogResponse,
        cfg: &FetchConfig,
        stop: &StopFlag,
        kickout: &mut KickOutInfo,
        timings: &mut PassTimings,
    ) -> Result<()> {
        if resp.log_num == 0 {
            debug!(svr = ?self.svr, "fetched zero logs");
            return Ok(());
        }
        self.task.append_log(resp.entry_buf.clone())?;

        for idx in 0..resp.log_num {
            let decode_started = Instant::now();
            let Some(group) = self.task.next_group_entry()? else {
                if idx + 1 < resp.log_num {
                    return Err(FetchError::Unexpected(format!(
                        "group entries ended after {idx} of {}",
                        resp.log_num
                    )));
                }
                break;
            };
            timings.decode_time += decode_started.elapsed();

            if !group.is_padding() {
                let mut tsi = TransStatInfo::default();
                for entry in group.entries() {
                    let mut missing = MissingLogInfo::new();
                    match self
                        .task
                        .read_log(entry, entry.lsn(), &mut missing, &mut tsi, stop)
                        .await
                    {
                        Ok(()) => {}
                        Err(FetchError::MissingLogs) => {
                            let need_reconsume = missing.need_reconsume_commit_entry();
                            match self.handle_log_miss(cfg, &missing, &mut tsi, stop).await {
                                Ok(()) => {
                                    if need_reconsume {
                                        // Every reference is present now; run
                                        // the commit/state entry again so the
                                        // transaction finalizes.
                                        let mut reconsume = MissingLogInfo::new();
                                        reconsume.set_resolving();
                                        reconsume.set_reconsume_commit_entry();
                                        self.task
                                            .read_log(
                                                entry,
                                                entry.lsn(),
                                                &mut reconsume,
                                                &mut tsi,
                                                stop,
                                            )
                                            .await?;
                                    }
                                }
                                Err(e) if e.is_retryable() => {
                                    warn!(
                                        stream = %self.task.tls_id(),
                                        error = %e,
                                        "missing log fetch failed, switching server"
                                    );
                                    kickout.set(KickOutReason::MissingLogFetchFail);
                                    timings.tsi.fold(&tsi);
                                    // Abandon the rest of this response; the
                                    // stream reopens on another server.
                                    return Ok(());
                                }
                                Err(e) => return Err(e),
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }
                timings.tsi.fold(&tsi);
            }

            self.task.update_progress(&group, group.start_lsn())?;
        }
        Ok(())
    }

    async fn handle_log_miss(
        &self,
        cfg: &FetchConfig,
        missing: &MissingLogInfo,
        tsi: &mut TransStatInfo,
        stop: &StopFlag,
    ) -> Result<()> {
        let svr = self.svr.ok_or_else(|| {
            FetchError::Unexpected("no server bound while resolving missing logs".into())
        })?;
        let resolver = MissLogResolver::new(
            self.rpc.as_ref(),
            self.task.as_ref(),
            self.task.tls_id(),
            svr,
            cfg.fetch_log_rpc_timeout,
        );
        resolver.resolve(missing, tsi, stop).await
    }

    fn check_feedback(&self, resp: &FetchLogResponse, kickout: &mut KickOutInfo) {
        let reason = match resp.feedback {
            FeedbackCode::None => return,
            FeedbackCode::LaggedFollower => KickOutReason::LaggedFollower,
            FeedbackCode::LogNotInThisServer => KickOutReason::LogNotInThisServer,
            FeedbackCode::LsOfflined => KickOutReason::LogStreamOfflined,
        };
        warn!(
            stream = %self.task.tls_id(),
            svr = ?self.svr,
            feedback = ?resp.feedback,
            "server feedback invalidates stream"
        );
        kickout.set(reason);
    }

    /// Per-pass housekeeping after a successfully read result. Aborts on
    /// the first failing step.
    async fn update_fetch_task_state(
        &mut self,
        cfg: &FetchConfig,
        stop: &StopFlag,
        kickout: &mut KickOutInfo,
        timings: &mut PassTimings,
    ) -> Result<()> {
        let need_check_switch = self.check_need_switch_server(cfg);

        if self.task.is_discarded() {
            info!(stream = %self.task.tls_id(), "recycle discarded fetch task");
            kickout.set(KickOutReason::Discarded);
            return Ok(());
        }

        // Progress clamped by flow control must not read as a stall.
        self.task.update_touch_tstamp_if_beyond(self.upper_limit);

        self.publish_progress().await?;

        if self.task.need_update_svr_list() {
            self.task
                .update_svr_list(cfg.print_svr_list_update_info)
                .await?;
        }

        self.check_fetch_timeout(kickout)?;

        if need_check_switch {
            self.check_switch_server(kickout);
        }

        let flush_started = Instant::now();
        self.task.sync(stop).await?;
        timings.flush_time += flush_started.elapsed();
        Ok(())
    }

    /// Rate-limit the switch-server probe; not re-checked on every pass.
    fn check_need_switch_server(&mut self, cfg: &FetchConfig) -> bool {
        let interval = cfg.check_switch_server_interval;
        let due = interval.is_zero()
            || self
                .last_switch_server_check
                .map_or(true, |at| at.elapsed() >= interval);
        if due {
            self.last_switch_server_check = Some(Instant::now());
        }
        due
    }

    fn check_fetch_timeout(&self, kickout: &mut KickOutInfo) -> Result<()> {
        let svr = self
            .svr
            .ok_or_else(|| FetchError::Unexpected("no server bound".into()))?;
        let resume_tstamp = self.pool.fetcher_resume_tstamp();
        let timeout = self
            .task
            .check_fetch_timeout(&svr, self.upper_limit, resume_tstamp)?;
        if timeout.timed_out {
            let reason = if timeout.on_lagged_replica {
                KickOutReason::ProgressTimeoutOnLaggedReplica
            } else {
                KickOutReason::ProgressTimeout
            };
            warn!(
                stream = %self.task.tls_id(),
                %svr,
                lagged = timeout.on_lagged_replica,
                "fetch progress timed out"
            );
            kickout.set(reason);
        }
        Ok(())
    }

    fn check_switch_server(&self, kickout: &mut KickOutInfo) {
        if kickout.need_kick_out() {
            return; // this pass already has a decision
        }
        let Some(svr) = self.svr else { return };
        if self.task.need_switch_server(&svr) {
            debug!(stream = %self.task.tls_id(), %svr, "higher priority server available");
            kickout.set(KickOutReason::NeedSwitchServer);
        }
    }

    async fn publish_progress(&self) -> Result<()> {
        let progress = self.task.progress();
        if !progress.is_valid() {
            return Err(FetchError::Unexpected(format!(
                "task {} has invalid progress",
                self.task.tls_id()
            )));
        }
        self.progress_controller
            .update_progress(self.task.progress_id(), progress)
            .await
    }

    async fn update_rpc_request_params(&mut self, cfg: &FetchConfig) -> Result<()> {
        self.upper_limit = self.compute_upper_limit(cfg).await?;
        self.chan
            .update_request(self.upper_limit, cfg.fetch_log_rpc_timeout);
        Ok(())
    }

    async fn compute_upper_limit(&self, cfg: &FetchConfig) -> Result<Progress> {
        let min_progress = self.progress_controller.min_progress().await?;
        if !min_progress.is_valid() {
            return Err(FetchError::Unexpected(
                "global min progress is invalid".into(),
            ));
        }
        Ok(min_progress.saturating_add(cfg.progress_window(self.stype)))
    }

    fn need_fetch_log(&self) -> Result<bool> {
        let progress = self.task.progress();
        if !progress.is_valid() {
            return Err(FetchError::Unexpected(format!(
                "task {} has invalid progress",
                self.task.tls_id()
            )));
        }
        Ok(progress < self.upper_limit)
    }

    async fn kick_out_task(&mut self, cfg: &FetchConfig, reason: KickOutReason) -> Result<()> {
        if reason.needs_blacklist() {
            let svr = self
                .svr
                .ok_or_else(|| FetchError::Unexpected("no server bound on kick-out".into()))?;
            let started = self.task.cur_svr_start_fetch_tstamp(&svr)?;
            let service_time = started.elapsed();
            self.task
                .add_into_blacklist(svr, service_time, cfg.blacklist_survival_time)?;
        }

        info!(
            stream = %self.task.tls_id(),
            svr = ?self.svr,
            reason = reason.as_str(),
            "kick out fetch task"
        );

        // Leave the fetching state before the handoff; a stale stream must
        // not pick the task up while it re-enters the idle pool.
        self.task.set_not_in_fetching_log();
        self.pool
            .dispatch_fetch_task(Arc::clone(&self.task), reason.as_str())
            .await
    }

    fn update_fetch_stat_info(
        &self,
        result: &FetchResult,
        handle_time: Duration,
        timings: &PassTimings,
    ) {
        // Failed rounds carry no throughput.
        if result.rcode.is_some() || result.resp.err != 0 {
            return;
        }
        let resp = &result.resp;
        self.stats.apply(|fsi| {
            fsi.fetch_log_cnt += u64::from(resp.log_num);
            fsi.fetch_log_size += resp.entry_buf.len() as u64;
            fsi.fetch_log_rpc_cnt += 1;
            fsi.fetch_log_rpc_time += result.rpc_time;
            fsi.fetch_log_rpc_to_svr_net_time += resp.status.l2s_net_time;
            fsi.fetch_log_rpc_svr_queue_time += resp.status.svr_queue_time;
            fsi.fetch_log_rpc_svr_process_time += resp.status.svr_process_time;
            fsi.fetch_log_rpc_callback_time += result.rpc_callback_time;
            fsi.handle_rpc_time += handle_time;
            fsi.read_log_time += timings.read_log_time;
            fsi.decode_log_entry_time += timings.decode_time;
            fsi.flush_time += timings.flush_time;
            fsi.tsi.fold(&timings.tsi);
            if result.stop_upon_result {
                if let Some(reason) = result.stop_reason {
                    fsi.record_stop_reason(reason);
                }
            }
        });
    }

    fn print_handle_info(
        &self,
        cfg: &FetchConfig,
        result: &FetchResult,
        outcome: &ResultOutcome,
        kickout: &KickOutInfo,
    ) {
        if cfg.print_rpc_handle_info {
            info!(
                stream = %self.task.tls_id(),
                upper_limit = %self.upper_limit,
                log_num = result.resp.log_num,
                stream_valid = outcome.stream_valid,
                invalid_reason = outcome.invalid_reason,
                hibernate = outcome.hibernate,
                kick_out = kickout.reason().as_str(),
                "handle rpc result"
            );
        } else {
            debug!(
                stream = %self.task.tls_id(),
                upper_limit = %self.upper_limit,
                log_num = result.resp.log_num,
                stream_valid = outcome.stream_valid,
                invalid_reason = outcome.invalid_reason,
                hibernate = outcome.hibernate,
                kick_out = kickout.reason().as_str(),
                "handle rpc result"
            );
        }
    }

    fn leave_stream(&self, cfg: &FetchConfig, reason: &'static str) {
        if cfg.print_stream_dispatch_info {
            info!(stream = %self.task.tls_id(), reason, "leave fetch stream");
        } else {
            debug!(stream = %self.task.tls_id(), reason, "leave fetch stream");
        }
    }
}

/// Completion-path hook: hands the stream back to the worker pool once the
/// in-flight request finishes.
struct PoolWaker {
    pool: Arc<dyn StreamWorkerPool>,
    stream: FetchStreamRef,
}

#[async_trait]
impl StreamWaker for PoolWaker {
    async fn wake(&self, reason: &'static str) {
        if let Err(error) = self
            .pool
            .dispatch_stream_task(Arc::clone(&self.stream), reason)
            .await
        {
            error!(%error, "re-dispatch after rpc completion failed");
        }
    }
}
