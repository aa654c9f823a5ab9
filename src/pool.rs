//! Bounded worker pool for conversion tasks
//!
//! At most `concurrency` tasks are in flight at once. Each admitted task runs
//! on its own tokio task, so a panic inside one record becomes that record's
//! [`TaskOutcome::Failure`] instead of taking the pool down. Outcomes are
//! yielded in completion order, never submission order.

use crate::error::TaskError;
use crate::task::ConversionTask;
use crate::types::TaskOutcome;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::num::NonZeroUsize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed-size pool that runs [`ConversionTask`]s
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: NonZeroUsize,
}

impl WorkerPool {
    /// Create a pool running at most `concurrency` tasks at a time
    pub fn new(concurrency: NonZeroUsize) -> Self {
        Self { concurrency }
    }

    /// Maximum number of tasks in flight
    pub fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    /// Run every task and return exactly one outcome per task
    pub async fn run(
        &self,
        tasks: Vec<ConversionTask>,
        cancel: &CancellationToken,
    ) -> Vec<TaskOutcome> {
        self.run_with(tasks, cancel, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `observer` as each outcome arrives
    ///
    /// Once `cancel` fires, tasks that have not started report
    /// [`TaskError::Cancelled`] without touching the filesystem, and running
    /// tasks are dropped, which kills their converter process.
    pub async fn run_with<F>(
        &self,
        tasks: Vec<ConversionTask>,
        cancel: &CancellationToken,
        mut observer: F,
    ) -> Vec<TaskOutcome>
    where
        F: FnMut(&TaskOutcome),
    {
        let total = tasks.len();
        debug!(
            tasks = total,
            concurrency = self.concurrency.get(),
            "starting worker pool"
        );

        let outcomes: Vec<TaskOutcome> = stream::iter(tasks)
            .map(|task| {
                let cancel = cancel.clone();
                async move { run_one(task, cancel).await }
            })
            .buffer_unordered(self.concurrency.get())
            .inspect(|outcome| observer(outcome))
            .collect()
            .await;

        debug!(tasks = total, outcomes = outcomes.len(), "worker pool drained");
        outcomes
    }
}

async fn run_one(task: ConversionTask, cancel: CancellationToken) -> TaskOutcome {
    let identifier = task.identifier().to_string();
    let staging = task.staging().to_path_buf();
    let failure = |error: TaskError| TaskOutcome::Failure {
        identifier: identifier.clone(),
        staging: staging.clone(),
        error,
    };

    if cancel.is_cancelled() {
        return failure(TaskError::Cancelled);
    }

    let handle = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = task.execute() => Some(outcome),
        }
    });

    match handle.await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => failure(TaskError::Cancelled),
        Err(e) if e.is_panic() => failure(TaskError::Panicked(panic_message(e.into_panic()))),
        Err(e) => failure(TaskError::Panicked(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
