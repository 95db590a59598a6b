//! Fixed-size worker pool
//!
//! Spawns `min(workers, units)` tasks that pull units of work from a shared
//! queue until it is empty. Results come back in submission order no matter
//! which worker finished first.

use nsbatch_core::{Error, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Bounded pool of async workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    workers: NonZeroUsize,
}

impl WorkerPool {
    /// Create a pool with `workers` workers
    ///
    /// # Errors
    /// Returns error if `workers` is zero
    pub fn new(workers: usize) -> Result<Self> {
        let workers = NonZeroUsize::new(workers)
            .ok_or_else(|| Error::invalid_config("worker count must be positive"))?;
        Ok(Self { workers })
    }

    /// Configured number of workers
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers.get()
    }

    /// Number of workers that will actually run for `units` units of work
    #[must_use]
    pub fn effective_parallelism(&self, units: usize) -> usize {
        self.workers.get().min(units)
    }

    /// Run `job` on every unit and collect the outputs in submission order
    ///
    /// # Errors
    /// Returns error if a worker task panicked
    pub async fn run<T, F, Fut>(&self, units: Vec<T>, job: F) -> Result<Vec<Fut::Output>>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let total = units.len();
        let parallelism = self.effective_parallelism(total);

        tracing::debug!(
            workers = self.workers.get(),
            units = total,
            parallelism,
            "Starting worker pool"
        );

        let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
            Arc::new(Mutex::new(units.into_iter().enumerate().collect()));
        let job = Arc::new(job);
        let mut workers = JoinSet::new();

        for worker in 0..parallelism {
            let queue = Arc::clone(&queue);
            let job = Arc::clone(&job);

            workers.spawn(async move {
                let mut done = Vec::new();
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, unit)) = next else {
                        break;
                    };

                    tracing::trace!(worker, index, "Worker picked up unit");
                    done.push((index, job(unit).await));
                }
                done
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            results.extend(joined?);
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, output)| output).collect())
    }
}
