//! Periodic refresh of tracked tickers.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

use pricecache_core::jobs::{JobQueue, JobStatus};

/// Delay before the first refresh, to let the worker pool come up.
const INITIAL_DELAY_SECS: u64 = 5;

/// Starts the refresh scheduler. Does nothing useful without tracked tickers.
pub fn start_refresh_scheduler(
    queue: Arc<JobQueue>,
    tickers: Vec<String>,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if tickers.is_empty() {
        info!("No tracked tickers configured, refresh scheduler not started");
        return None;
    }

    Some(tokio::spawn(async move {
        info!(
            "Price refresh scheduler started ({} tickers every {}s)",
            tickers.len(),
            every.as_secs()
        );
        tokio::time::sleep(Duration::from_secs(INITIAL_DELAY_SECS)).await;

        let mut ticks = interval(every.max(Duration::from_secs(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;
            run_scheduled_refresh(&queue, &tickers).await;
        }
    }))
}

async fn run_scheduled_refresh(queue: &JobQueue, tickers: &[String]) {
    let handle = match queue.enqueue_price_fetch_job(tickers.to_vec(), None) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Could not enqueue scheduled price refresh: {}", e);
            return;
        }
    };

    let snapshot = handle.wait().await;
    match snapshot.status {
        JobStatus::Completed => info!(
            "Scheduled price refresh {} updated {}/{} tickers",
            handle.id(),
            snapshot.result.map(|r| r.updated).unwrap_or(0),
            tickers.len()
        ),
        JobStatus::Failed => warn!(
            "Scheduled price refresh {} failed: {}",
            handle.id(),
            snapshot.error.unwrap_or_default()
        ),
        status => info!(
            "Scheduled price refresh {} ended as {:?}",
            handle.id(),
            status
        ),
    }
}
