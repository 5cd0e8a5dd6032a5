//! Bounded-concurrency fan-out.
//!
//! Both primitives take a list of task *factories* (`FnOnce() -> Future`) so
//! that no work starts before a slot is available for it:
//!
//! - [`settle_all`] keeps a sliding window of at most `limit` spawned tasks and
//!   starts the next factory as soon as a slot frees.
//! - [`settle_chunked`] groups factories into chunks of at most `chunk_size`;
//!   members of a chunk run in parallel, chunks run one after another.
//!
//! Neither primitive short-circuits on task-level failures: a task that
//! resolves to `Err` is simply a value in the output. Results are returned in
//! input order, not completion order. Only a failure of the machinery itself
//! (a task that panicked or was cancelled) surfaces as [`SettleError`], and
//! only after every dispatched task has settled.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::error;

use crate::sync::Semaphore;
use crate::task::{spawn, JoinHandle};

/// Failure of the fan-out machinery, as opposed to a failure of a task's work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettleError {
    /// A spawned task panicked or was cancelled before producing a value.
    #[error("Task {index} did not complete: {message}")]
    Join { index: usize, message: String },

    /// The permit pool was closed while tasks were still pending.
    #[error("Concurrency limiter closed before all tasks were dispatched")]
    Closed,
}

/// Runs every factory with at most `limit` tasks in flight.
///
/// A `limit` of zero is treated as one.
pub async fn settle_all<F, Fut, T>(limit: usize, tasks: Vec<F>) -> Result<Vec<T>, SettleError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut handles = Vec::with_capacity(tasks.len());

    for factory in tasks {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Let already dispatched work settle before reporting.
                let _ = join_in_order(handles).await;
                return Err(SettleError::Closed);
            }
        };

        handles.push(spawn(async move {
            let output = factory().await;
            drop(permit);
            output
        }));
    }

    join_in_order(handles).await
}

/// Runs factories in sequential chunks of at most `chunk_size` parallel tasks.
///
/// A chunk is always awaited in full. When a task in a chunk fails to join,
/// the remaining chunks are not started. A `chunk_size` of zero is treated
/// as one.
pub async fn settle_chunked<F, Fut, T>(
    chunk_size: usize,
    tasks: Vec<F>,
) -> Result<Vec<T>, SettleError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let chunk_size = chunk_size.max(1);
    let mut results = Vec::with_capacity(tasks.len());
    let mut pending = tasks.into_iter().peekable();
    let mut offset = 0;

    while pending.peek().is_some() {
        let handles: Vec<_> = pending
            .by_ref()
            .take(chunk_size)
            .map(|factory| spawn(async move { factory().await }))
            .collect();
        let dispatched = handles.len();

        match join_in_order(handles).await {
            Ok(mut chunk) => results.append(&mut chunk),
            Err(SettleError::Join { index, message }) => {
                return Err(SettleError::Join {
                    index: offset + index,
                    message,
                });
            }
            Err(other) => return Err(other),
        }

        offset += dispatched;
    }

    Ok(results)
}

async fn join_in_order<T>(handles: Vec<JoinHandle<T>>) -> Result<Vec<T>, SettleError> {
    let mut results = Vec::with_capacity(handles.len());
    let mut failure = None;

    for (index, outcome) in join_all(handles).await.into_iter().enumerate() {
        match outcome {
            Ok(output) => results.push(output),
            Err(e) => {
                error!(task = index, error = %e, "Fan-out task did not complete");
                if failure.is_none() {
                    failure = Some(SettleError::Join {
                        index,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(results),
    }
}
