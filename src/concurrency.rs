//! Worker pool and run budget.
//!
//! Parsing, matching and tracing are CPU-bound and run on a dedicated rayon pool
//! so the CLI's tokio runtime only handles signals and the wall-clock budget.

use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::ConcurrencyConfig;
use crate::error::Result;

/// Dedicated rayon pool for one scanner.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
    batch_size: usize,
}

impl WorkerPool {
    /// Build a pool from configuration. `worker_threads = 0` uses every core.
    pub fn new(config: &ConcurrencyConfig) -> Result<Self> {
        let threads = if config.worker_threads == 0 {
            num_cpus::get()
        } else {
            config.worker_threads
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("auditor-worker-{}", idx))
            .build()?;

        info!("Worker pool: {} threads, batch size {}", threads, config.batch_size);

        Ok(Self {
            pool,
            threads,
            batch_size: config.batch_size.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run a closure inside the pool; nested `par_iter` calls use its threads.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    /// Map items in parallel, one bounded batch at a time, keeping input order.
    pub fn map_batched<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        let total_batches = items.len().div_ceil(self.batch_size);
        let mut results = Vec::with_capacity(items.len());
        let mut items = items.into_iter().peekable();
        let mut batch_idx = 0;

        while items.peek().is_some() {
            batch_idx += 1;
            let batch: Vec<T> = items.by_ref().take(self.batch_size).collect();
            debug!("Processing batch {}/{} ({} items)", batch_idx, total_batches, batch.len());
            let out: Vec<R> = self.pool.install(|| batch.into_par_iter().map(&f).collect());
            results.extend(out);
        }

        results
    }
}

/// Wall-clock budget for one run.
///
/// Cloning shares the cancel flag, so a signal handler can stop a running scan.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            budget: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            budget: Some(budget),
            ..Self::unbounded()
        }
    }

    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Self::after(Duration::from_secs(secs)),
            None => Self::unbounded(),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn expired(&self) -> bool {
        self.is_cancelled()
            || self
                .budget
                .map(|budget| self.started.elapsed() >= budget)
                .unwrap_or(false)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_batched_keeps_order() {
        let pool = WorkerPool::new(&ConcurrencyConfig {
            worker_threads: 2,
            batch_size: 3,
        })
        .unwrap();

        let out = pool.map_batched((0..10).collect(), |x: i32| x * 2);
        assert_eq!(out, (0..10).map(|x| x * 2).collect::<Vec<_>>());
        assert_eq!(pool.threads(), 2);
    }

    #[test]
    fn test_deadline() {
        assert!(!Deadline::unbounded().expired());
        assert!(Deadline::after(Duration::ZERO).expired());

        let deadline = Deadline::from_secs(Some(3600));
        let shared = deadline.clone();
        assert!(!deadline.expired());
        shared.cancel();
        assert!(deadline.expired());
    }
}
