mod config;
mod main_lib;
mod scheduler;

use std::sync::Arc;

use config::Config;
use main_lib::{build_context, init_tracing};
use pricecache_core::JobQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let config = Config::from_env();
    let ctx = build_context(&config).await?;

    let queue = Arc::new(JobQueue::start(ctx, config.workers));
    let scheduler = scheduler::start_refresh_scheduler(
        queue.clone(),
        config.tracked_tickers.clone(),
        config.refresh_interval,
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down price worker");

    if let Some(scheduler) = scheduler {
        scheduler.abort();
    }
    queue.shutdown().await;
    Ok(())
}
