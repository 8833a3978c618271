//! Job queue and worker pool.
//!
//! Jobs go into one unbounded `mpsc` channel. `workers` tasks share the
//! receiving end and each pulls the next job when idle, so every enqueued job
//! is run exactly once. Shutdown closes the channel; workers drain whatever
//! is still queued and then exit.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use futures::FutureExt;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::price_fetch::{panic_message, PriceFetchJob};
use super::progress::{job_channel, JobHandle, JobProgress};
use crate::context::PriceContext;
use crate::errors::{Error, Result};

struct QueuedJob {
    job: PriceFetchJob,
    progress: JobProgress,
}

pub struct JobQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Spawns `workers` worker tasks (at least one) on the current runtime.
    pub fn start(ctx: Arc<PriceContext>, workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<QueuedJob>();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let count = workers.max(1);

        let handles = (0..count)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, rx.clone(), ctx.clone())))
            .collect();

        info!("Price job queue started with {} workers", count);
        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    /// Queues a price refresh for `tickers`. `as_of` selects historical closes.
    pub fn enqueue_price_fetch_job(
        &self,
        tickers: Vec<String>,
        as_of: Option<NaiveDate>,
    ) -> Result<JobHandle> {
        self.enqueue(PriceFetchJob::new(tickers, as_of))
    }

    pub fn enqueue(&self, job: PriceFetchJob) -> Result<JobHandle> {
        let (progress, handle) = job_channel();
        let tx = lock_or_recover(&self.tx, "sender")
            .clone()
            .ok_or_else(|| Error::JobQueue("queue is shut down".to_string()))?;

        tx.send(QueuedJob { job, progress })
            .map_err(|_| Error::JobQueue("all workers have stopped".to_string()))?;
        Ok(handle)
    }

    /// Stops accepting jobs, lets workers finish the queued ones and waits for them.
    pub async fn shutdown(&self) {
        lock_or_recover(&self.tx, "sender").take();
        let workers: Vec<JoinHandle<()>> =
            std::mem::take(&mut *lock_or_recover(&self.workers, "workers"));

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Price job worker ended abnormally: {}", e);
            }
        }
        info!("Price job queue stopped");
    }
}

fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Job queue {} lock was poisoned, recovering", what);
        poisoned.into_inner()
    })
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    ctx: Arc<PriceContext>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(queued) = next else {
            break;
        };
        run_job(worker_id, &ctx, queued).await;
    }
}

async fn run_job(worker_id: usize, ctx: &PriceContext, queued: QueuedJob) {
    let QueuedJob { job, progress } = queued;

    if progress.is_cancelled() {
        info!("Price fetch job {} cancelled before start", progress.id());
        progress.mark_cancelled(None);
        return;
    }

    info!(
        "Worker {} starting price fetch job {} ({} tickers)",
        worker_id,
        progress.id(),
        job.tickers.len()
    );
    progress.mark_running();

    let result = AssertUnwindSafe(job.run(ctx, &progress))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(outcome)) if outcome.cancelled => progress.mark_cancelled(Some(outcome)),
        Ok(Ok(outcome)) => progress.mark_completed(outcome),
        Ok(Err(e)) => {
            error!("Price fetch job {} failed: {}", progress.id(), e);
            progress.mark_failed(e.to_string());
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!("Price fetch job {} panicked: {}", progress.id(), message);
            progress.mark_failed(format!("job panicked: {}", message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;
    use crate::jobs::JobStatus;
    use crate::settings::PriceSettings;
    use pricecache_market_data::PriceSource;

    fn empty_context() -> Arc<PriceContext> {
        let registered: Vec<Arc<dyn PriceSource>> = Vec::new();
        Arc::new(PriceContext::new(
            PriceSettings::default(),
            Arc::new(MemoryBackend::new()),
            &registered,
        ))
    }

    #[tokio::test]
    async fn test_job_without_sources_completes_with_nothing_updated() {
        let queue = JobQueue::start(empty_context(), 2);
        let handle = queue
            .enqueue_price_fetch_job(vec!["AAA".to_string()], None)
            .unwrap();

        let snapshot = handle.wait().await;
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.result.map(|r| r.updated), Some(0));
        assert!(handle.is_finished());
        assert!(!handle.is_failed());

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let queue = JobQueue::start(empty_context(), 1);
        queue.shutdown().await;

        let err = queue
            .enqueue_price_fetch_job(vec!["AAA".to_string()], None)
            .unwrap_err();
        assert!(matches!(err, Error::JobQueue(_)));
    }

    #[tokio::test]
    async fn test_zero_workers_still_runs_jobs() {
        let queue = JobQueue::start(empty_context(), 0);
        let handle = queue.enqueue_price_fetch_job(Vec::new(), None).unwrap();
        assert_eq!(handle.wait().await.status, JobStatus::Completed);
        queue.shutdown().await;
    }
}
