//! Missing-log resolution protocol.
//!
//! Given the references a transaction reported missing, fetch every one of
//! them through the out-of-band synchronous RPC — including references
//! discovered transitively while applying earlier rounds. The RPC here is
//! the one true blocking point of the engine: the worker sits on it until
//! the server answers or the timeout fires.
//!
//! ## Rounds and batches
//!
//! A *round* resolves one sorted, deduplicated set of LSNs, split into
//! batches of at most [`MAX_MISS_LOG_PER_RPC`]. The batch that consumes the
//! final redo/state LSN also carries the set's single record-log LSN, which
//! is always fetched last. Entries discovered while applying a round become
//! the next round's set, replacing the previous one.
//!
//! ## Validation
//!
//! Every response's `next_miss_lsn` watermark must equal the boundary of
//! the batch just requested (last requested LSN on a full answer, the first
//! unserved LSN on a partial one). A mismatch, or more entries than
//! requested, is a protocol violation: fatal, nothing applied, no automatic
//! retry. Transport and server errors are retryable — the caller kicks out
//! the current server and the next one gets a fresh attempt.

use crate::error::{FetchError, Result};
use crate::missing::MissingLogInfo;
use crate::rpc::{FetchMissLogRequest, FetchMissLogResponse, LogRpc};
use crate::stats::TransStatInfo;
use crate::traits::LsFetchCtx;
use crate::StopFlag;
use logcdc_core::{Lsn, TenantLsId};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

/// Most missing LSNs requested in one RPC batch.
pub const MAX_MISS_LOG_PER_RPC: usize = 100;

/// Resolves one transaction's missing references against one server.
pub struct MissLogResolver<'a> {
    rpc: &'a dyn LogRpc,
    task: &'a dyn LsFetchCtx,
    tls_id: TenantLsId,
    svr: SocketAddr,
    timeout: Duration,
}

impl<'a> MissLogResolver<'a> {
    pub fn new(
        rpc: &'a dyn LogRpc,
        task: &'a dyn LsFetchCtx,
        tls_id: TenantLsId,
        svr: SocketAddr,
        timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            task,
            tls_id,
            svr,
            timeout,
        }
    }

    /// Fully resolve `missing`, chaining rounds until no new references
    /// surface.
    pub async fn resolve(
        &self,
        missing: &MissingLogInfo,
        tsi: &mut TransStatInfo,
        stop: &StopFlag,
    ) -> Result<()> {
        if missing.is_empty() {
            return Err(FetchError::InvalidArgument("empty missing log info"));
        }

        let mut handling = missing.clone();
        handling.sort_and_dedup();

        loop {
            let total = handling.total_count();
            let mut fetched = 0usize;
            let mut discovered = MissingLogInfo::new();
            discovered.set_resolving();

            while fetched < total {
                if stop.is_cancelled() {
                    return Err(FetchError::Stopped);
                }

                let batch = handling.next_batch(fetched, MAX_MISS_LOG_PER_RPC);
                let resp = self
                    .rpc
                    .fetch_missing_log(
                        self.svr,
                        FetchMissLogRequest {
                            tls_id: self.tls_id,
                            miss_lsns: batch.clone(),
                            timeout: self.timeout,
                        },
                    )
                    .await?;
                if resp.err != 0 {
                    return Err(FetchError::Server(resp.err));
                }

                check_next_miss_lsn(&batch, &resp)?;
                self.read_batch(&resp, &handling, total, &mut fetched, tsi, &mut discovered)
                    .await?;
            }

            debug_assert_eq!(fetched, total);

            if discovered.is_empty() {
                info!(stream = %self.tls_id, resolved = total, "missing logs resolved");
                return Ok(());
            }

            debug!(
                stream = %self.tls_id,
                resolved = total,
                discovered = discovered.total_count(),
                "missing logs chained into next round"
            );
            discovered.sort_and_dedup();
            handling = discovered;
        }
    }

    /// Apply one response's entries against the round's expected LSNs.
    async fn read_batch(
        &self,
        resp: &FetchMissLogResponse,
        handling: &MissingLogInfo,
        total: usize,
        fetched: &mut usize,
        tsi: &mut TransStatInfo,
        discovered: &mut MissingLogInfo,
    ) -> Result<()> {
        if resp.entries.is_empty() {
            return Err(FetchError::Unexpected(
                "missing-log response carried no entries".into(),
            ));
        }

        for entry in &resp.entries {
            if *fetched >= total {
                return Err(FetchError::Unexpected(format!(
                    "server returned more missing logs than the {total} requested"
                )));
            }
            let lsn = handling.lsn_at(*fetched).ok_or_else(|| {
                FetchError::Unexpected(format!("no expected LSN at index {fetched}"))
            })?;
            self.task
                .read_miss_tx_log(entry, lsn, tsi, discovered)
                .await?;
            *fetched += 1;
        }

        Ok(())
    }
}

/// The watermark must land exactly on the batch boundary: the last
/// requested LSN when the whole batch was served, the first unserved LSN
/// when it was cut short.
fn check_next_miss_lsn(batch: &[Lsn], resp: &FetchMissLogResponse) -> Result<()> {
    let batch_cnt = batch.len();
    let resp_cnt = resp.entries.len();

    let expected = if batch_cnt == resp_cnt {
        batch[batch_cnt - 1]
    } else if batch_cnt > resp_cnt {
        batch[resp_cnt]
    } else {
        return Err(FetchError::Unexpected(format!(
            "server served {resp_cnt} missing logs for a batch of {batch_cnt}"
        )));
    };

    if expected != resp.next_miss_lsn {
        return Err(FetchError::Unexpected(format!(
            "missing-log watermark {} does not match requested boundary {}",
            resp.next_miss_lsn, expected
        )));
    }

    Ok(())
}
