//! Bounded-concurrency task runner
//!
//! Consumes tasks from a channel and executes each one on its own tokio
//! task, never running more than `max_concurrency` at once. A permit is
//! taken before a task is received, so the channel (and therefore the
//! producer) is throttled while the runner is saturated.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Runs tasks with at most `max_concurrency` in flight
#[derive(Debug, Clone)]
pub struct ConcurrencyRunner {
    max_concurrency: usize,
}

impl ConcurrencyRunner {
    /// Creates a runner; a ceiling of zero is raised to one
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Executes every task received on `rx` and returns how many ran
    ///
    /// Returns once the channel is closed and every spawned task has
    /// finished. A panicking task is logged and does not stop the others.
    pub async fn run<T, F, Fut>(&self, mut rx: mpsc::Receiver<T>, execute: F) -> usize
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut started = 0usize;

        loop {
            // Reap finished tasks so the set does not grow with the run
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }

            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let Some(task) = rx.recv().await else {
                break;
            };

            started += 1;
            let fut = execute(task);
            tasks.spawn(async move {
                fut.await;
                drop(permit);
            });
        }

        debug!(started, in_flight = tasks.len(), "Queue drained, waiting for uploads");
        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        started
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Upload task panicked");
        } else {
            debug!(error = %e, "Upload task cancelled");
        }
    }
}
