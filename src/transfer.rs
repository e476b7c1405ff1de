// src/transfer.rs
//
//! Batch transfer engine.
//!
//! Fans many independent store operations out over a semaphore-bounded
//! worker pool, in fixed-size batches processed strictly in sequence.
//! Item failures are captured per item and never abort siblings or later
//! batches; the only pre-dispatch abort is a structural precondition
//! violation ([`TransferError`]).

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_WORKER_LIMIT};

/// Structural errors reported before any work is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    #[error("source and destination lists must be the same length (got {sources} sources, {dests} destinations)")]
    LengthMismatch { sources: usize, dests: usize },
    #[error("invalid transfer options: {0}")]
    InvalidOptions(&'static str),
}

/// Tuning knobs for a batch transfer run.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Upper bound on concurrently executing tasks within one batch.
    pub worker_limit: usize,
    /// Number of requests per batch; the next batch starts only after the
    /// previous one has fully drained.
    pub batch_size: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            worker_limit: DEFAULT_WORKER_LIMIT,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl TransferOptions {
    pub fn with_worker_limit(mut self, worker_limit: usize) -> Self {
        self.worker_limit = worker_limit;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn validate(&self) -> Result<(), TransferError> {
        if self.worker_limit == 0 {
            return Err(TransferError::InvalidOptions("worker_limit must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(TransferError::InvalidOptions("batch_size must be greater than zero"));
        }
        Ok(())
    }
}

/// Terminal state of one transfer request.
#[derive(Debug)]
pub struct TransferOutcome {
    pub source: String,
    pub dest: String,
    pub error: Option<anyhow::Error>,
}

impl TransferOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item outcomes of a whole run, in input order.
#[derive(Debug, Default)]
pub struct TransferReport {
    pub outcomes: Vec<TransferOutcome>,
    pub batches: usize,
}

impl TransferReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded())
    }
}

/// Run `op` over every `(source, dest)` pair, `batch_size` pairs at a time,
/// with at most `worker_limit` tasks in flight. Batches are processed
/// strictly in sequence; pairs within a batch complete in any order.
///
/// Returns one [`TransferOutcome`] per pair, in input order. The lists
/// having different lengths aborts before any dispatch.
pub async fn copy_batched<F, Fut>(
    source_keys: &[String],
    dest_keys: &[String],
    options: &TransferOptions,
    op: F,
) -> Result<TransferReport>
where
    F: Fn(String, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if source_keys.len() != dest_keys.len() {
        return Err(TransferError::LengthMismatch {
            sources: source_keys.len(),
            dests: dest_keys.len(),
        }
        .into());
    }
    options.validate()?;

    let total_batches = source_keys.len().div_ceil(options.batch_size);

    // One pool for the whole run; each batch drains it before the next starts.
    let sem = Arc::new(Semaphore::new(options.worker_limit));
    let mut report = TransferReport {
        outcomes: Vec::with_capacity(source_keys.len()),
        batches: total_batches,
    };

    for (batch_idx, (src_chunk, dst_chunk)) in source_keys
        .chunks(options.batch_size)
        .zip(dest_keys.chunks(options.batch_size))
        .enumerate()
    {
        let outcomes = run_batch(src_chunk, dst_chunk, &sem, &op).await?;
        report.outcomes.extend(outcomes);
        info!("finished batch {}/{}", batch_idx + 1, total_batches);
    }

    Ok(report)
}

/// Pool-bounded variant without batching: every pair is dispatched into a
/// single drain. Used for download fan-out, where there is no reclaim
/// point between chunks.
pub async fn download_pooled<F, Fut>(
    keys: &[String],
    local_paths: &[String],
    worker_limit: usize,
    op: F,
) -> Result<TransferReport>
where
    F: Fn(String, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    if keys.len() != local_paths.len() {
        return Err(TransferError::LengthMismatch {
            sources: keys.len(),
            dests: local_paths.len(),
        }
        .into());
    }
    if worker_limit == 0 {
        return Err(TransferError::InvalidOptions("worker_limit must be greater than zero").into());
    }

    let sem = Arc::new(Semaphore::new(worker_limit));
    let outcomes = run_batch(keys, local_paths, &sem, &op).await?;
    Ok(TransferReport { outcomes, batches: 1 })
}

// Dispatch one batch and wait for every task to reach a terminal state.
// Item errors become outcomes; a panicking worker is the one post-dispatch
// condition that aborts the run.
async fn run_batch<F, Fut>(
    src_chunk: &[String],
    dst_chunk: &[String],
    sem: &Arc<Semaphore>,
    op: &F,
) -> Result<Vec<TransferOutcome>>
where
    F: Fn(String, String) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut futs = FuturesUnordered::new();
    for (idx, (src, dst)) in src_chunk.iter().zip(dst_chunk).enumerate() {
        let sem = sem.clone();
        let op = op.clone();
        let src = src.clone();
        let dst = dst.clone();
        futs.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.context("worker pool closed")?;
            let result = op(src.clone(), dst.clone()).await;
            Ok::<_, anyhow::Error>((idx, src, dst, result))
        }));
    }

    let mut collected = Vec::with_capacity(src_chunk.len());
    while let Some(joined) = futs.next().await {
        let (idx, source, dest, result) = joined.context("transfer worker panicked")??;
        let error = match result {
            Ok(()) => None,
            Err(e) => {
                warn!("transfer of {} -> {} failed: {:#}", source, dest, e);
                Some(e)
            }
        };
        collected.push((idx, TransferOutcome { source, dest, error }));
    }

    // Restore input order; completion order within the batch is arbitrary.
    collected.sort_by_key(|(idx, _)| *idx);
    Ok(collected.into_iter().map(|(_, outcome)| outcome).collect())
}
