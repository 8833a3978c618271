//! End-to-end tests: job queue, fetch jobs and the in-memory cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Semaphore;

use pricecache_core::jobs::{JobQueue, JobStatus};
use pricecache_core::{MemoryBackend, PriceContext, PriceSettings};
use pricecache_market_data::{
    MarketDataError, PlausibilityCheck, PriceSource, Quote, SourceCapabilities,
};

/// Serves fixed prices per ticker; unknown tickers are not found.
struct TableSource {
    id: &'static str,
    prices: HashMap<&'static str, Decimal>,
    plausibility: PlausibilityCheck,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl TableSource {
    fn new(id: &'static str, prices: &[(&'static str, Decimal)]) -> Self {
        Self {
            id,
            prices: prices.iter().copied().collect(),
            plausibility: PlausibilityCheck::Basic,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn strict(mut self) -> Self {
        self.plausibility = PlausibilityCheck::MinimumPrice;
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn lookup(&self, ticker: &str) -> Result<Decimal, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.prices
            .get(ticker)
            .copied()
            .ok_or_else(|| MarketDataError::SymbolNotFound(ticker.to_string()))
    }
}

#[async_trait]
impl PriceSource for TableSource {
    fn id(&self) -> &'static str {
        self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities {
            supports_historical: true,
            plausibility: self.plausibility,
        }
    }

    async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let price = self.lookup(ticker).await?;
        Ok(Quote::current(ticker, price, self.id, Utc::now()))
    }

    async fn fetch_historical(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<Quote, MarketDataError> {
        let price = self.lookup(ticker).await?;
        Ok(Quote::historical(ticker, date, price, self.id))
    }
}

fn context(priority: &[&str], sources: Vec<Arc<TableSource>>) -> Arc<PriceContext> {
    let settings = PriceSettings {
        source_priority: priority.iter().map(|s| s.to_string()).collect(),
        source_timeout: Duration::from_secs(5),
        ..PriceSettings::default()
    };
    let registered: Vec<Arc<dyn PriceSource>> = sources
        .into_iter()
        .map(|s| s as Arc<dyn PriceSource>)
        .collect();
    Arc::new(PriceContext::new(
        settings,
        Arc::new(MemoryBackend::new()),
        &registered,
    ))
}

fn tickers(names: &[&str]) -> Vec<String> {
    names.iter().map(|t| t.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_jobs_warm_the_cache_in_priority_order() {
    let tradingview = Arc::new(
        TableSource::new("tradingview", &[("AAA", dec!(0.5)), ("BBB", dec!(20))]).strict(),
    );
    let yfinance = Arc::new(TableSource::new(
        "yfinance",
        &[("AAA", dec!(12.0)), ("BBB", dec!(21)), ("CCC", dec!(3.5))],
    ));
    let ctx = context(
        &["TradingView", "yfinance", "tradingview"],
        vec![tradingview.clone(), yfinance.clone()],
    );
    let queue = JobQueue::start(ctx.clone(), 3);

    let first = queue
        .enqueue_price_fetch_job(tickers(&["AAA", "BBB"]), None)
        .unwrap();
    let second = queue
        .enqueue_price_fetch_job(tickers(&["CCC", "MISSING"]), None)
        .unwrap();

    let first = first.wait().await;
    let second = second.wait().await;
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.result.map(|r| r.updated), Some(2));
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(second.result.map(|r| r.updated), Some(1));

    let aaa = ctx.cache.get_current_price("AAA").await.unwrap();
    assert_eq!(aaa.price, Some(dec!(12.0)));
    assert_eq!(aaa.source.as_deref(), Some("yfinance"));

    let bbb = ctx.cache.get_current_price("BBB").await.unwrap();
    assert_eq!(bbb.source.as_deref(), Some("tradingview"));

    let prices = ctx
        .cache
        .get_cached_prices(["AAA", "BBB", "CCC", "MISSING"])
        .await
        .unwrap();
    assert_eq!(prices.len(), 3);
    assert!(!prices.contains_key("MISSING"));
    assert_eq!(
        ctx.cache.get_price_retry_count("MISSING", None).await.unwrap(),
        3
    );

    queue.shutdown().await;
}

#[tokio::test]
async fn test_historical_job_end_to_end() {
    let stooq = Arc::new(TableSource::new("stooq", &[("AAA", dec!(101.5))]));
    let ctx = context(&["stooq"], vec![stooq]);
    let queue = JobQueue::start(ctx.clone(), 1);
    let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();

    let handle = queue
        .enqueue_price_fetch_job(tickers(&["aaa"]), Some(date))
        .unwrap();
    let snapshot = handle.wait().await;

    assert_eq!(snapshot.stage, "completed");
    let outcome = snapshot.result.unwrap();
    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.as_of, Some(date));
    assert_eq!(outcome.tickers, vec!["aaa".to_string()]);

    let cached = ctx.cache.get_historical_price("AAA", date).await.unwrap();
    assert_eq!(cached.price, Some(dec!(101.5)));
    assert_eq!(cached.source.as_deref(), Some("stooq"));

    queue.shutdown().await;
}

#[tokio::test]
async fn test_cancelling_a_queued_job_skips_it() {
    let gate = Arc::new(Semaphore::new(0));
    let source = Arc::new(TableSource::new("yfinance", &[("AAA", dec!(1.5))]).gated(gate.clone()));
    let ctx = context(&["yfinance"], vec![source.clone()]);
    let queue = JobQueue::start(ctx.clone(), 1);

    let running = queue
        .enqueue_price_fetch_job(tickers(&["AAA"]), None)
        .unwrap();
    let queued = queue
        .enqueue_price_fetch_job(tickers(&["AAA"]), None)
        .unwrap();
    assert_ne!(running.id(), queued.id());

    queued.cancel();
    gate.add_permits(10);

    let running = running.wait().await;
    let queued_snapshot = queued.wait().await;
    assert_eq!(running.status, JobStatus::Completed);
    assert_eq!(queued_snapshot.status, JobStatus::Cancelled);
    assert_eq!(queued_snapshot.stage, "cancelled");
    assert!(queued.is_cancelled());
    assert!(queued.result().is_none());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_queued_jobs() {
    let source = Arc::new(TableSource::new("yfinance", &[("AAA", dec!(2))]));
    let ctx = context(&["yfinance"], vec![source]);
    let queue = JobQueue::start(ctx.clone(), 1);

    let handles: Vec<_> = (0..5)
        .map(|_| {
            queue
                .enqueue_price_fetch_job(tickers(&["AAA"]), None)
                .unwrap()
        })
        .collect();
    queue.shutdown().await;

    for handle in handles {
        assert!(handle.is_finished());
        assert_eq!(handle.result().map(|r| r.updated), Some(1));
    }
}
