//! Shared mock collaborators for the fetch engine integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use logcdc_core::{FetchStreamType, GroupEntry, LogEntry, Lsn, Progress, TenantLsId};
use logcdc_fetcher::{
    ConfigCell, FetchError, FetchLogRequest, FetchLogResponse, FetchMissLogRequest,
    FetchMissLogResponse, FetchStream, FetchStreamRef, FetchTimeout, LogRpc, LsFetchCtx,
    MissingLogInfo, ProgressController, Result, StopFlag, StreamWorkerPool, TransStatInfo,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tonic::Status;

pub fn tls() -> TenantLsId {
    TenantLsId::new(1001, 1)
}

pub fn svr() -> SocketAddr {
    "127.0.0.1:2881".parse().unwrap()
}

pub fn group(start: u64, entry_lsns: &[u64]) -> GroupEntry {
    let entries = entry_lsns
        .iter()
        .map(|&lsn| LogEntry::new(Lsn::new(lsn), Bytes::from_static(b"redo")))
        .collect();
    GroupEntry::new(Lsn::new(start), entries)
}

/// A fetch response that carries `log_num` groups and ends the request's
/// rounds by hitting the flow-control ceiling.
pub fn final_response(log_num: u32) -> FetchLogResponse {
    FetchLogResponse {
        log_num,
        entry_buf: Bytes::from_static(b"groups"),
        reached_upper_limit: true,
        ..FetchLogResponse::default()
    }
}

/// Poll until `cond` holds; panics after ~2 seconds.
pub async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A stream wired to mock collaborators, already prepared against `svr()`.
pub struct Harness {
    pub stream: FetchStreamRef,
    pub task: Arc<MockTask>,
    pub rpc: Arc<MockRpc>,
    pub pool: Arc<MockPool>,
    pub progress: Arc<MockProgress>,
    pub stop: StopFlag,
}

pub async fn harness(
    responses: Vec<std::result::Result<FetchLogResponse, Status>>,
) -> Harness {
    harness_with(FetchStreamType::HotLog, 1_000, responses).await
}

pub async fn harness_with(
    stype: FetchStreamType,
    min_progress_nanos: i64,
    responses: Vec<std::result::Result<FetchLogResponse, Status>>,
) -> Harness {
    let task = MockTask::new(stype);
    let rpc = MockRpc::new(responses);
    let pool = MockPool::new();
    let progress = MockProgress::new(min_progress_nanos);
    let config = Arc::new(ConfigCell::default());

    let stream = FetchStream::new(
        1001,
        task.clone(),
        stype,
        rpc.clone(),
        pool.clone(),
        progress.clone(),
        config,
    )
    .unwrap();
    FetchStream::prepare_to_fetch(&stream, svr()).await.unwrap();

    Harness {
        stream,
        task,
        rpc,
        pool,
        progress,
        stop: StopFlag::new(),
    }
}

// ---------------------------------------------------------------------------
// MockRpc
// ---------------------------------------------------------------------------

/// Scripted fetch responses plus an auto-answering missing-log side.
pub struct MockRpc {
    fetch_responses: Mutex<VecDeque<std::result::Result<FetchLogResponse, Status>>>,
    pub fetch_requests: Mutex<Vec<FetchLogRequest>>,
    pub miss_requests: Mutex<Vec<Vec<Lsn>>>,
    miss_fail: Mutex<Option<Status>>,
    wrong_watermark: AtomicBool,
}

impl MockRpc {
    pub fn new(fetch_responses: Vec<std::result::Result<FetchLogResponse, Status>>) -> Arc<Self> {
        Arc::new(Self {
            fetch_responses: Mutex::new(fetch_responses.into()),
            fetch_requests: Mutex::new(Vec::new()),
            miss_requests: Mutex::new(Vec::new()),
            miss_fail: Mutex::new(None),
            wrong_watermark: AtomicBool::new(false),
        })
    }

    pub fn fail_missing_log(&self, status: Status) {
        *self.miss_fail.lock().unwrap() = Some(status);
    }

    pub fn answer_with_wrong_watermark(&self) {
        self.wrong_watermark.store(true, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_requests.lock().unwrap().len()
    }

    pub fn miss_calls(&self) -> usize {
        self.miss_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LogRpc for MockRpc {
    async fn fetch_log(
        &self,
        _svr: SocketAddr,
        req: FetchLogRequest,
    ) -> std::result::Result<FetchLogResponse, Status> {
        self.fetch_requests.lock().unwrap().push(req);
        self.fetch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchLogResponse::default()))
    }

    async fn fetch_missing_log(
        &self,
        _svr: SocketAddr,
        req: FetchMissLogRequest,
    ) -> std::result::Result<FetchMissLogResponse, Status> {
        self.miss_requests.lock().unwrap().push(req.miss_lsns.clone());
        if let Some(status) = self.miss_fail.lock().unwrap().clone() {
            return Err(status);
        }
        let next_miss_lsn = if self.wrong_watermark.load(Ordering::SeqCst) {
            Lsn::new(u64::MAX)
        } else {
            *req.miss_lsns.last().expect("non-empty batch")
        };
        Ok(FetchMissLogResponse {
            err: 0,
            next_miss_lsn,
            entries: req
                .miss_lsns
                .iter()
                .map(|&lsn| LogEntry::new(lsn, Bytes::new()))
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// MockPool
// ---------------------------------------------------------------------------

/// Records scheduling calls without re-entering the stream.
#[derive(Default)]
pub struct MockPool {
    pub stream_dispatches: Mutex<Vec<&'static str>>,
    pub hibernates: Mutex<Vec<&'static str>>,
    pub fetch_dispatches: Mutex<Vec<&'static str>>,
}

impl MockPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stream_dispatch_count(&self) -> usize {
        self.stream_dispatches.lock().unwrap().len()
    }

    pub fn hibernate_count(&self) -> usize {
        self.hibernates.lock().unwrap().len()
    }

    pub fn fetch_dispatch_reasons(&self) -> Vec<&'static str> {
        self.fetch_dispatches.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamWorkerPool for MockPool {
    async fn dispatch_stream_task(
        &self,
        _stream: FetchStreamRef,
        reason: &'static str,
    ) -> Result<()> {
        self.stream_dispatches.lock().unwrap().push(reason);
        Ok(())
    }

    async fn hibernate_stream_task(
        &self,
        _stream: FetchStreamRef,
        reason: &'static str,
    ) -> Result<()> {
        self.hibernates.lock().unwrap().push(reason);
        Ok(())
    }

    async fn dispatch_fetch_task(
        &self,
        _task: Arc<dyn LsFetchCtx>,
        reason: &'static str,
    ) -> Result<()> {
        self.fetch_dispatches.lock().unwrap().push(reason);
        Ok(())
    }

    fn fetcher_resume_tstamp(&self) -> Option<Instant> {
        None
    }
}

// ---------------------------------------------------------------------------
// MockProgress
// ---------------------------------------------------------------------------

pub struct MockProgress {
    min: AtomicI64,
    pub updates: Mutex<Vec<(u64, Progress)>>,
}

impl MockProgress {
    pub fn new(min_nanos: i64) -> Arc<Self> {
        Arc::new(Self {
            min: AtomicI64::new(min_nanos),
            updates: Mutex::new(Vec::new()),
        })
    }

    pub fn published(&self) -> Vec<Progress> {
        self.updates.lock().unwrap().iter().map(|(_, p)| *p).collect()
    }
}

#[async_trait]
impl ProgressController for MockProgress {
    async fn min_progress(&self) -> Result<Progress> {
        Ok(Progress::from_nanos(self.min.load(Ordering::SeqCst)))
    }

    async fn update_progress(&self, progress_id: u64, progress: Progress) -> Result<()> {
        self.updates.lock().unwrap().push((progress_id, progress));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockTask
// ---------------------------------------------------------------------------

/// How the mock answers `read_log` for a given entry LSN.
#[derive(Debug, Clone)]
pub enum ReadScript {
    /// Report missing references, then succeed on the resolving re-read.
    Missing {
        redo: Vec<u64>,
        record: Option<u64>,
        reconsume: bool,
    },
    /// The server no longer agrees on this position.
    NotSync,
}

pub struct MockTask {
    tls_id: TenantLsId,
    stype: FetchStreamType,
    created: Instant,

    pub progress_nanos: AtomicI64,
    pub next_lsn: AtomicU64,
    in_fetching: AtomicBool,
    pub discarded: AtomicBool,
    pub switch_server: AtomicBool,
    pub svr_list_stale: AtomicBool,
    pub timeout_probe: Mutex<FetchTimeout>,

    groups: Mutex<VecDeque<GroupEntry>>,
    read_scripts: Mutex<HashMap<u64, ReadScript>>,
    discoveries: Mutex<HashMap<u64, Vec<u64>>>,

    pub read_calls: Mutex<Vec<(u64, bool)>>,
    pub miss_reads: Mutex<Vec<u64>>,
    pub progress_updates: Mutex<Vec<Lsn>>,
    pub blacklist_calls: Mutex<Vec<(SocketAddr, Duration, Duration)>>,
    pub dispatched_to: Mutex<Option<SocketAddr>>,
    pub append_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub touch_refreshes: AtomicUsize,
    pub svr_list_updates: AtomicUsize,
    pub not_in_fetching_calls: AtomicUsize,
}

impl MockTask {
    pub fn new(stype: FetchStreamType) -> Arc<Self> {
        Arc::new(Self {
            tls_id: tls(),
            stype,
            created: Instant::now(),
            progress_nanos: AtomicI64::new(0),
            next_lsn: AtomicU64::new(0),
            in_fetching: AtomicBool::new(false),
            discarded: AtomicBool::new(false),
            switch_server: AtomicBool::new(false),
            svr_list_stale: AtomicBool::new(false),
            timeout_probe: Mutex::new(FetchTimeout::default()),
            groups: Mutex::new(VecDeque::new()),
            read_scripts: Mutex::new(HashMap::new()),
            discoveries: Mutex::new(HashMap::new()),
            read_calls: Mutex::new(Vec::new()),
            miss_reads: Mutex::new(Vec::new()),
            progress_updates: Mutex::new(Vec::new()),
            blacklist_calls: Mutex::new(Vec::new()),
            dispatched_to: Mutex::new(None),
            append_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            touch_refreshes: AtomicUsize::new(0),
            svr_list_updates: AtomicUsize::new(0),
            not_in_fetching_calls: AtomicUsize::new(0),
        })
    }

    pub fn push_group(&self, group: GroupEntry) {
        self.groups.lock().unwrap().push_back(group);
    }

    pub fn script_read(&self, lsn: u64, script: ReadScript) {
        self.read_scripts.lock().unwrap().insert(lsn, script);
    }

    /// Applying the backfilled `lsn` reveals further missing references.
    pub fn script_discovery(&self, lsn: u64, discovered: Vec<u64>) {
        self.discoveries.lock().unwrap().insert(lsn, discovered);
    }

    pub fn is_in_fetching(&self) -> bool {
        self.in_fetching.load(Ordering::SeqCst)
    }

    pub fn blacklisted(&self) -> Vec<(SocketAddr, Duration, Duration)> {
        self.blacklist_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LsFetchCtx for MockTask {
    fn tls_id(&self) -> TenantLsId {
        self.tls_id
    }

    fn fetch_stream_type(&self) -> FetchStreamType {
        self.stype
    }

    fn next_lsn(&self) -> Lsn {
        Lsn::new(self.next_lsn.load(Ordering::SeqCst))
    }

    fn progress(&self) -> Progress {
        Progress::from_nanos(self.progress_nanos.load(Ordering::SeqCst))
    }

    fn progress_id(&self) -> u64 {
        7
    }

    fn is_in_fetching_log(&self) -> bool {
        self.in_fetching.load(Ordering::SeqCst)
    }

    fn set_not_in_fetching_log(&self) {
        self.not_in_fetching_calls.fetch_add(1, Ordering::SeqCst);
        self.in_fetching.store(false, Ordering::SeqCst);
    }

    fn dispatch_in_fetch_stream(&self, svr: SocketAddr, _stream: FetchStreamRef) {
        *self.dispatched_to.lock().unwrap() = Some(svr);
        self.in_fetching.store(true, Ordering::SeqCst);
    }

    fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::SeqCst)
    }

    fn cur_svr_start_fetch_tstamp(&self, _svr: &SocketAddr) -> Result<Instant> {
        Ok(self.created)
    }

    fn add_into_blacklist(
        &self,
        svr: SocketAddr,
        service_time: Duration,
        survival_time: Duration,
    ) -> Result<()> {
        self.blacklist_calls
            .lock()
            .unwrap()
            .push((svr, service_time, survival_time));
        Ok(())
    }

    fn check_fetch_timeout(
        &self,
        _svr: &SocketAddr,
        _upper_limit: Progress,
        _resume_tstamp: Option<Instant>,
    ) -> Result<FetchTimeout> {
        Ok(*self.timeout_probe.lock().unwrap())
    }

    fn need_switch_server(&self, _svr: &SocketAddr) -> bool {
        self.switch_server.load(Ordering::SeqCst)
    }

    fn need_update_svr_list(&self) -> bool {
        self.svr_list_stale.load(Ordering::SeqCst)
    }

    async fn update_svr_list(&self, _verbose: bool) -> Result<()> {
        self.svr_list_updates.fetch_add(1, Ordering::SeqCst);
        self.svr_list_stale.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn update_touch_tstamp_if_beyond(&self, _upper_limit: Progress) {
        self.touch_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn append_log(&self, _buf: Bytes) -> Result<()> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn next_group_entry(&self) -> Result<Option<GroupEntry>> {
        Ok(self.groups.lock().unwrap().pop_front())
    }

    async fn read_log(
        &self,
        _entry: &LogEntry,
        lsn: Lsn,
        missing: &mut MissingLogInfo,
        tsi: &mut TransStatInfo,
        _stop: &StopFlag,
    ) -> Result<()> {
        if missing.is_resolving() {
            self.read_calls.lock().unwrap().push((lsn.val(), true));
            return Ok(());
        }
        let script = self.read_scripts.lock().unwrap().get(&lsn.val()).cloned();
        match script {
            Some(ReadScript::Missing {
                redo,
                record,
                reconsume,
            }) => {
                self.read_calls.lock().unwrap().push((lsn.val(), false));
                for r in redo {
                    missing.push_redo_or_state(Lsn::new(r));
                }
                if let Some(rec) = record {
                    missing.set_record_log(Lsn::new(rec));
                }
                if reconsume {
                    missing.set_reconsume_commit_entry();
                }
                Err(FetchError::MissingLogs)
            }
            Some(ReadScript::NotSync) => Err(FetchError::LogNotSync),
            None => {
                self.read_calls.lock().unwrap().push((lsn.val(), false));
                tsi.redo_cnt += 1;
                Ok(())
            }
        }
    }

    async fn read_miss_tx_log(
        &self,
        _entry: &LogEntry,
        lsn: Lsn,
        _tsi: &mut TransStatInfo,
        discovered: &mut MissingLogInfo,
    ) -> Result<()> {
        self.miss_reads.lock().unwrap().push(lsn.val());
        if let Some(new) = self.discoveries.lock().unwrap().remove(&lsn.val()) {
            for n in new {
                discovered.push_redo_or_state(Lsn::new(n));
            }
        }
        Ok(())
    }

    fn update_progress(&self, _group: &GroupEntry, start_lsn: Lsn) -> Result<()> {
        self.progress_updates.lock().unwrap().push(start_lsn);
        // Each applied group moves the stream forward one millisecond.
        self.progress_nanos.fetch_add(1_000_000, Ordering::SeqCst);
        Ok(())
    }

    async fn sync(&self, stop: &StopFlag) -> Result<()> {
        if stop.is_cancelled() {
            return Err(FetchError::Stopped);
        }
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
