// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The map-reduce executor.
//!
//! split → map (bounded, with timeout + one doubled retry) → reduce, with
//! progress events along the way. The executor only fails for split-time
//! errors; everything per-item is materialised as data in the results.

use crate::job::{Job, ProgressSender};
use crate::limiter::{Limiter, Settled};
use crate::mapper::{MapCtx, Mapper};
use crate::splitter::SplitError;
use fanout_core::{ExecutionStats, JobId, JobPhase, JobProgress, MapResult, PipelineItem};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Error text recorded on items the run never mapped because it was
/// cancelled first.
pub const CANCELLED: &str = "cancelled";

/// Errors that abort a whole run before any mapping happens
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Split(#[from] SplitError),
}

/// Final outcome of one executed job.
pub struct JobOutcome {
    pub job_id: JobId,
    /// True iff every item mapped successfully and the run was not
    /// cancelled. Per-item detail lives in `map_results`.
    pub success: bool,
    pub output: crate::reducer::ReduceOutput,
    /// One result per input item, in input order.
    pub map_results: Vec<MapResult>,
    pub stats: ExecutionStats,
}

/// Run one job to completion.
pub async fn run_job(job: Job) -> Result<JobOutcome, ExecuteError> {
    let Job { id, name, splitter, mapper, reducer, options } = job;
    let started = Instant::now();
    let cancel = options.cancel.clone();
    let progress = options.progress.clone();

    emit(&progress, JobProgress::at_phase(JobPhase::Split, 0));
    let items = splitter.split()?;
    let total = items.len();
    tracing::info!(job = %id, %name, total, "starting map phase");

    emit(&progress, JobProgress::at_phase(JobPhase::Map, total));
    let map_started = Instant::now();
    let (map_results, failed_maps) = map_phase(
        items,
        Arc::clone(&mapper),
        options.max_concurrency,
        options.timeout,
        &cancel,
        &progress,
    )
    .await;
    let map_phase_ms = map_started.elapsed().as_millis() as u64;

    emit(&progress, JobProgress::at_phase(JobPhase::Reduce, total));
    let reduce_started = Instant::now();
    let output = reducer.reduce(&map_results, &cancel).await;
    let reduce_phase_ms = reduce_started.elapsed().as_millis() as u64;

    emit(&progress, JobProgress::at_phase(JobPhase::Done, total));

    let successful_maps = map_results.iter().filter(|r| r.success).count();
    let success = successful_maps == total && !cancel.is_cancelled();
    let stats = ExecutionStats {
        total_items: total,
        successful_maps,
        failed_maps,
        map_phase_ms,
        reduce_phase_ms,
        total_ms: started.elapsed().as_millis() as u64,
    };
    tracing::info!(
        job = %id,
        success,
        successful = successful_maps,
        failed = total - successful_maps,
        elapsed_ms = stats.total_ms,
        "job finished"
    );

    Ok(JobOutcome { job_id: id, success, output, map_results, stats })
}

/// Map every item under the limiter via `all_settled`. Returns results in
/// input order plus the count of mapper contract violations (panicked map
/// tasks).
async fn map_phase(
    items: Vec<PipelineItem>,
    mapper: Arc<dyn Mapper>,
    max_concurrency: usize,
    timeout: Duration,
    cancel: &CancellationToken,
    progress: &Option<ProgressSender>,
) -> (Vec<MapResult>, usize) {
    let total = items.len();
    let limiter = Limiter::new(max_concurrency);
    let completed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = items
        .iter()
        .cloned()
        .map(|item| {
            let mapper = Arc::clone(&mapper);
            let cancel = cancel.clone();
            let progress = progress.clone();
            let completed = Arc::clone(&completed);
            async move {
                // A cancelled run does no further mapper work; the slot is
                // given straight back.
                if cancel.is_cancelled() {
                    return MapResult::failure(item, CANCELLED).with_attempts(0);
                }
                let result = map_with_retry(mapper.as_ref(), &item, timeout, &cancel).await;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                emit(&progress, JobProgress::map_step(done, total, result.item.label()));
                result
            }
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    let mut failed_maps = 0;
    for (index, settled) in limiter.all_settled(tasks).await.into_iter().enumerate() {
        match settled {
            Settled::Fulfilled(result) => results.push(result),
            Settled::Rejected(reason) => {
                // Mapper contract violation: the task panicked.
                failed_maps += 1;
                tracing::error!(index, %reason, "map task panicked");
                results.push(MapResult::failure(
                    items[index].clone(),
                    format!("mapper panicked: {reason}"),
                ));
            }
        }
    }
    (results, failed_maps)
}

/// One mapper invocation with the executor-enforced timeout discipline:
/// on the first timeout the attempt is cancelled and retried exactly once
/// at double the budget; a second timeout is a hard per-item failure.
async fn map_with_retry(
    mapper: &dyn Mapper,
    item: &PipelineItem,
    timeout: Duration,
    cancel: &CancellationToken,
) -> MapResult {
    let first_token = cancel.child_token();
    let ctx = MapCtx { cancel: &first_token, attempt: 1, timeout };
    match tokio::time::timeout(timeout, mapper.map(item, ctx)).await {
        Ok(result) => result.with_attempts(1),
        Err(_) => {
            first_token.cancel();
            if cancel.is_cancelled() {
                return MapResult::failure(item.clone(), CANCELLED).with_attempts(1);
            }
            let retry_timeout = timeout * 2;
            tracing::warn!(?timeout, ?retry_timeout, "map attempt timed out, retrying once");

            let retry_token = cancel.child_token();
            let ctx = MapCtx { cancel: &retry_token, attempt: 2, timeout: retry_timeout };
            match tokio::time::timeout(retry_timeout, mapper.map(item, ctx)).await {
                Ok(result) => result.with_attempts(2),
                Err(_) => {
                    retry_token.cancel();
                    MapResult::failure(
                        item.clone(),
                        format!(
                            "map timed out after {:?} and retry after {:?}",
                            timeout, retry_timeout
                        ),
                    )
                    .with_attempts(2)
                }
            }
        }
    }
}

fn emit(progress: &Option<ProgressSender>, event: JobProgress) {
    if let Some(sender) = progress {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
