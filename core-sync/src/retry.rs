//! # Retry Coordinator
//!
//! Drives one bulk push or delete pass by pass.
//!
//! ## Workflow
//!
//! 1. Every key is attempted once, in chunks of at most `chunk_size`
//!    parallel attempts; chunks run one after another.
//! 2. Attempts failing with a retryable error are deferred to the pass's
//!    [`RetryQueue`] instead of being reported.
//! 3. When a pass ends with a non-empty queue, a new pass runs over the
//!    queued keys only, with the same chunking.
//! 4. The run ends when a pass defers nothing. Every key ends up succeeded,
//!    skipped or permanently failed.
//!
//! Without a pass cap an item that fails retryably forever keeps the run
//! alive forever. With a cap, the last permitted pass tells the operation to
//! report retryable failures ([`Attempt::report_retryable`]) and records
//! them as permanent.
//!
//! A failure of the dispatch machinery itself (a panicked or cancelled
//! attempt) aborts the run with [`SyncError::Concurrency`]. Outcomes of
//! passes that completed before it stand; their side effects are not undone.

use std::future::Future;
use std::sync::Arc;

use core_async::throttle::settle_chunked;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// Per-attempt information handed to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based pass number.
    pub pass: u32,
    /// Whether a retryable failure on this attempt must be reported, because
    /// no further pass will follow.
    pub report_retryable: bool,
}

impl Attempt {
    /// Attempt made outside a coordinated run. Retryable failures are left
    /// to the caller.
    pub fn standalone() -> Self {
        Self {
            pass: 1,
            report_retryable: false,
        }
    }
}

/// Deferred work of one pass.
#[derive(Debug)]
pub struct RetryQueue<K> {
    total: usize,
    deferred: Vec<(K, SyncError)>,
}

impl<K> RetryQueue<K> {
    /// Queue for a pass over `total` keys.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            deferred: Vec::new(),
        }
    }

    pub fn defer(&mut self, key: K, error: SyncError) {
        self.deferred.push((key, error));
    }

    /// Number of keys the pass started with.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn len(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }

    pub fn into_keys(self) -> Vec<K> {
        self.deferred.into_iter().map(|(key, _)| key).collect()
    }
}

/// Outcome of a coordinated run.
#[derive(Debug)]
pub struct RetryReport<K, V> {
    /// Values of successful attempts, first-pass successes first.
    pub succeeded: Vec<V>,
    /// Keys the operation declined to act on.
    pub skipped: Vec<K>,
    /// Keys that failed permanently, with their last error.
    pub failed: Vec<(K, SyncError)>,
    /// Number of passes run.
    pub passes: u32,
    /// Number of keys the run started with.
    pub total: usize,
}

/// Chunked, pass-based retry driver.
#[derive(Debug, Clone, Copy)]
pub struct RetryCoordinator {
    chunk_size: usize,
    max_passes: Option<u32>,
}

impl RetryCoordinator {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_passes: None,
        }
    }

    /// Caps the number of passes. `None` retries until nothing is deferred.
    pub fn with_max_passes(mut self, max_passes: Option<u32>) -> Self {
        self.max_passes = max_passes.map(|passes| passes.max(1));
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Runs `operation` over `keys` until no retryable failure is left.
    ///
    /// The operation returns `Ok(Some(value))` on success, `Ok(None)` when it
    /// skipped the key, and `Err` on failure.
    pub async fn run<K, V, F, Fut>(&self, keys: Vec<K>, operation: F) -> Result<RetryReport<K, V>>
    where
        K: Clone + Send + 'static,
        V: Send + 'static,
        F: Fn(K, Attempt) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    {
        let operation = Arc::new(operation);
        let mut report = RetryReport {
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            passes: 0,
            total: keys.len(),
        };

        let mut pending = keys;
        while !pending.is_empty() {
            let pass = report.passes + 1;
            let attempt = Attempt {
                pass,
                report_retryable: self.max_passes.map_or(false, |max| pass >= max),
            };

            debug!(
                pass,
                items = pending.len(),
                chunk_size = self.chunk_size,
                "Starting pass"
            );

            let tasks: Vec<_> = pending
                .iter()
                .cloned()
                .map(|key| {
                    let operation = Arc::clone(&operation);
                    move || async move { (*operation)(key, attempt).await }
                })
                .collect();

            let outcomes = settle_chunked(self.chunk_size, tasks).await?;
            report.passes = pass;

            let mut queue = RetryQueue::new(pending.len());
            for (key, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    Ok(Some(value)) => report.succeeded.push(value),
                    Ok(None) => report.skipped.push(key),
                    Err(err) if err.is_retryable() && !attempt.report_retryable => {
                        queue.defer(key, err)
                    }
                    Err(err) => report.failed.push((key, err)),
                }
            }

            if !queue.is_empty() {
                info!(
                    pass,
                    deferred = queue.len(),
                    attempted = queue.total(),
                    "Deferring retryable failures to next pass"
                );
            }

            pending = queue.into_keys();
        }

        info!(
            total = report.total,
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            passes = report.passes,
            "Retry run finished"
        );

        Ok(report)
    }
}
