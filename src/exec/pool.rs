#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::{Result, anyhow};
use tokio::sync::Semaphore;

use crate::exec::worker::{TaskWorker, WorkCtx, WorkJob, WorkOutput};

/// Bounded concurrent executor. At most `max_workers` jobs run at once;
/// callers past the cap suspend on the semaphore and resume in FIFO order.
/// Cheap to clone: all state is shared.
#[derive(Clone)]
pub struct WorkerPool {
    worker: Arc<dyn TaskWorker>,
    slots: Arc<Semaphore>,
    max_workers: usize,
    stats: Arc<Mutex<PoolStats>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    pub total_executed: u64,
    pub total_failed: u64,
    pub avg_duration_ms: f64,
}

impl WorkerPool {
    pub fn new(worker: Arc<dyn TaskWorker>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            worker,
            slots: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            stats: Arc::new(Mutex::new(PoolStats::default())),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run one job, waiting for a slot if the pool is saturated. The slot is
    /// released and the stats updated on both the success and failure paths.
    pub async fn execute(&self, job: &WorkJob, ctx: &WorkCtx) -> Result<WorkOutput> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| anyhow!("worker pool shut down"))?;

        let started = Instant::now();
        let result = self.worker.execute(job, ctx).await;
        self.record(started.elapsed().as_millis() as f64, result.is_err());
        result
    }

    pub fn stats(&self) -> PoolStats {
        match self.stats.lock() {
            Ok(stats) => *stats,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn record(&self, duration_ms: f64, failed: bool) {
        let mut stats = match self.stats.lock() {
            Ok(stats) => stats,
            Err(poisoned) => poisoned.into_inner(),
        };
        stats.total_executed += 1;
        if failed {
            stats.total_failed += 1;
        }
        // Rolling mean over everything the pool has run.
        let n = stats.total_executed as f64;
        stats.avg_duration_ms += (duration_ms - stats.avg_duration_ms) / n;
    }
}
