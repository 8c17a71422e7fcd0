//! Bounded worker pool for write-behind populate and invalidation fan-out.
//! Nothing submitted here is ever awaited by a reader: `CoreEngine::get_or_load`
//! returns to its caller without waiting on the tier writes or the
//! invalidation publish its hit/miss path schedules.

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info_span, warn, Instrument};

#[derive(Debug, Clone, Copy)]
pub struct AsyncSchedulerConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
}

impl Default for AsyncSchedulerConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 4,
            max_pool_size: 16,
            queue_capacity: 256,
        }
    }
}

/// A fixed-size pool of long-lived worker tasks draining a bounded queue,
/// with a semaphore allowing the pool to burst from `core_pool_size` up to
/// `max_pool_size` concurrently active jobs.
pub struct AsyncScheduler {
    sender: mpsc::Sender<BoxFuture<'static, ()>>,
    queue_capacity: usize,
    overflow_spawns: Arc<AtomicUsize>,
}

impl AsyncScheduler {
    pub fn new(config: AsyncSchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let permits = Arc::new(Semaphore::new(config.max_pool_size));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        for worker_id in 0..config.core_pool_size {
            let receiver = receiver.clone();
            let permits = permits.clone();
            tokio::spawn(
                async move {
                    loop {
                        let job = {
                            let mut rx = receiver.lock().await;
                            rx.recv().await
                        };
                        let Some(job) = job else {
                            return;
                        };
                        let Ok(permit) = permits.clone().acquire_owned().await else {
                            return;
                        };
                        job.await;
                        drop(permit);
                    }
                }
                .instrument(info_span!("async-scheduler-worker", worker = worker_id)),
            );
        }

        Self {
            sender,
            queue_capacity: config.queue_capacity,
            overflow_spawns: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueues `job` on the bounded pool. If the queue is full, spawns the
    /// job directly on the Tokio runtime instead of blocking the caller —
    /// submit must never make `get_or_load` a blocking call under load.
    /// Sustained saturation therefore trades bounded concurrency for
    /// unbounded growth rather than losing work or stalling readers.
    pub fn submit(&self, job: BoxFuture<'static, ()>) {
        match self.sender.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.overflow_spawns.fetch_add(1, Ordering::Relaxed);
                warn!(
                    queue_capacity = self.queue_capacity,
                    "async scheduler queue full, spawning job directly"
                );
                tokio::spawn(job);
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tokio::spawn(job);
            }
        }
    }

    pub fn overflow_spawns(&self) -> usize {
        self.overflow_spawns.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_jobs_run() {
        let scheduler = AsyncScheduler::new(AsyncSchedulerConfig {
            core_pool_size: 2,
            max_pool_size: 4,
            queue_capacity: 8,
        });
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..5 {
            let counter = counter.clone();
            scheduler.submit(Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn overflow_spawns_directly_instead_of_blocking() {
        let scheduler = AsyncScheduler::new(AsyncSchedulerConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 1,
        });
        // Occupy the single worker with a long job, then flood the queue.
        scheduler.submit(Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }));
        for _ in 0..10 {
            scheduler.submit(Box::pin(async move {}));
        }
        assert!(scheduler.overflow_spawns() > 0);
    }
}
