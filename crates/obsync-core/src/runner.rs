//! Bounded-concurrency task runner.
//!
//! A fixed pool of `min(limit, len)` worker futures pulls indexed items from a
//! shared queue and writes each result into the slot of its input index, so
//! output order always matches input order. A failing item only affects its
//! own slot. Cancellation is cooperative: workers stop taking new items, items
//! already running finish, and slots that never started hold
//! [`Error::Cancelled`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::RunnerConfig;
use crate::error::{Error, Result};

/// Counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Items never started because the batch was cancelled
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results<R>(results: &[Result<R>]) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result {
                Ok(_) => summary.succeeded += 1,
                Err(Error::Cancelled) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
            summary
        })
    }

    pub const fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Runner with a fixed concurrency and a cancellation token.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an existing token, e.g. a child of the caller's shutdown token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop starting new items.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn run<I, R, F, Fut>(&self, inputs: Vec<I>, f: F) -> Vec<Result<R>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.run_with_progress(inputs, f, |_, _| {}).await
    }

    pub async fn run_with_progress<I, R, F, Fut, P>(
        &self,
        inputs: Vec<I>,
        f: F,
        progress: P,
    ) -> Vec<Result<R>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<R>>,
        P: Fn(usize, usize),
    {
        let results = execute(
            self.config.effective_concurrency(),
            inputs,
            f,
            progress,
            &self.cancel,
        )
        .await;

        let summary = BatchSummary::from_results(&results);
        if summary.total() > 0 {
            tracing::info!(
                "Batch finished: {} succeeded, {} failed, {} skipped",
                summary.succeeded,
                summary.failed,
                summary.skipped
            );
        }
        results
    }
}

/// Run `f` over `inputs` with at most `limit` items in flight.
pub async fn process<I, R, F, Fut>(limit: usize, inputs: Vec<I>, f: F) -> Vec<Result<R>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    process_with_progress(limit, inputs, f, |_, _| {}).await
}

/// Like [`process`], calling `progress(completed, total)` once per finished item.
pub async fn process_with_progress<I, R, F, Fut, P>(
    limit: usize,
    inputs: Vec<I>,
    f: F,
    progress: P,
) -> Vec<Result<R>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R>>,
    P: Fn(usize, usize),
{
    execute(limit.max(1), inputs, f, progress, &CancellationToken::new()).await
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn execute<I, R, F, Fut, P>(
    limit: usize,
    inputs: Vec<I>,
    f: F,
    progress: P,
    cancel: &CancellationToken,
) -> Vec<Result<R>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<R>>,
    P: Fn(usize, usize),
{
    let total = inputs.len();
    if total == 0 {
        return Vec::new();
    }

    let queue = Mutex::new(inputs.into_iter().enumerate().collect::<VecDeque<_>>());
    let slots = Mutex::new((0..total).map(|_| None).collect::<Vec<Option<Result<R>>>>());
    let completed = AtomicUsize::new(0);

    let (queue, slots, completed, f, progress) = (&queue, &slots, &completed, &f, &progress);
    let workers = (0..limit.min(total)).map(|_| async move {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some((index, input)) = lock(queue).pop_front() else {
                break;
            };

            let result = f(input).await;
            lock(slots)[index] = Some(result);

            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(done, total);
        }
    });
    join_all(workers).await;

    let results: Vec<Result<R>> = lock(slots)
        .drain(..)
        .map(|slot| slot.unwrap_or(Err(Error::Cancelled)))
        .collect();
    if cancel.is_cancelled() {
        tracing::debug!(
            "Batch cancelled after {} of {total} items",
            completed.load(Ordering::SeqCst)
        );
    }
    results
}
