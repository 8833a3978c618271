//! Price Fetch Job.
//!
//! For each ticker the job keeps asking the Market Data Service for a quote
//! until one is found or the ticker's retry budget runs out:
//!
//! ```text
//!   attempts = retry_count(ticker, as_of)
//!   while attempts < max_attempts:
//!       quote = fetch (historical if as_of, else current bypassing the cache)
//!       if quote has a price: write it, reset the counter, done
//!       attempts = increment(retry counter)
//! ```
//!
//! Tickers are independent. One ticker's failure (or panic) never aborts the
//! batch; only an unreachable cache backend fails the whole job.

use std::panic::AssertUnwindSafe;

use chrono::NaiveDate;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::progress::{fetching_stage, JobProgress};
use crate::cache::normalize_ticker;
use crate::context::PriceContext;
use crate::errors::Result;

/// A batch of tickers to refresh, either current prices or closes for `as_of`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFetchJob {
    pub tickers: Vec<String>,
    pub as_of: Option<NaiveDate>,
}

/// Summary of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceFetchOutcome {
    /// Tickers whose price was written during this run.
    pub updated: usize,
    pub tickers: Vec<String>,
    pub as_of: Option<NaiveDate>,
    /// The job stopped early on a cancellation request.
    pub cancelled: bool,
}

/// How a single ticker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerOutcome {
    Updated,
    Exhausted,
}

impl PriceFetchJob {
    pub fn new(tickers: Vec<String>, as_of: Option<NaiveDate>) -> Self {
        Self { tickers, as_of }
    }

    pub fn current(tickers: Vec<String>) -> Self {
        Self::new(tickers, None)
    }

    pub fn historical(tickers: Vec<String>, date: NaiveDate) -> Self {
        Self::new(tickers, Some(date))
    }

    /// Runs the batch. Returns `Err` only for job-fatal errors.
    pub async fn run(&self, ctx: &PriceContext, progress: &JobProgress) -> Result<PriceFetchOutcome> {
        let total = self.tickers.len();
        let mut outcome = PriceFetchOutcome {
            updated: 0,
            tickers: self.tickers.clone(),
            as_of: self.as_of,
            cancelled: false,
        };

        for (index, raw_ticker) in self.tickers.iter().enumerate() {
            if progress.is_cancelled() {
                info!(
                    "Price fetch job {} cancelled after {}/{} tickers",
                    progress.id(),
                    index,
                    total
                );
                outcome.cancelled = true;
                break;
            }

            progress.set_stage(fetching_stage(index + 1, total));

            let ticker = normalize_ticker(raw_ticker);
            if ticker.is_empty() {
                continue;
            }

            let result = AssertUnwindSafe(self.refresh_ticker(ctx, &ticker))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(TickerOutcome::Updated)) => outcome.updated += 1,
                Ok(Ok(TickerOutcome::Exhausted)) => {}
                Ok(Err(e)) if e.is_fatal() => {
                    error!("Price fetch job {} aborted on {}: {}", progress.id(), ticker, e);
                    return Err(e);
                }
                Ok(Err(e)) => error!("Failed to refresh price for {}: {}", ticker, e),
                Err(panic) => error!(
                    "Refreshing price for {} panicked: {}",
                    ticker,
                    panic_message(panic.as_ref())
                ),
            }
        }

        info!(
            "Price fetch job {} updated {}/{} tickers",
            progress.id(),
            outcome.updated,
            total
        );
        Ok(outcome)
    }

    /// `ticker` must already be normalized so source lookups and cache keys agree.
    async fn refresh_ticker(&self, ctx: &PriceContext, ticker: &str) -> Result<TickerOutcome> {
        let max_attempts = ctx.settings.max_attempts;
        let mut attempts = ctx.cache.get_price_retry_count(ticker, self.as_of).await?;

        if attempts >= max_attempts {
            debug!(
                "Retry budget for {} already spent ({}/{}), skipping",
                ticker, attempts, max_attempts
            );
            return Ok(TickerOutcome::Exhausted);
        }

        while attempts < max_attempts {
            let quote = match self.as_of {
                Some(date) => {
                    ctx.market_data
                        .get_historical_price_quote(ticker, date)
                        .await
                }
                None => ctx.market_data.get_current_price_quote(ticker, false).await,
            };

            if let (Some(price), Some(source)) = (quote.price, quote.source.as_deref()) {
                match self.as_of {
                    Some(date) => {
                        ctx.cache
                            .set_historical_price(ticker, date, price, source)
                            .await?
                    }
                    None => ctx.cache.set_current_price(ticker, price, source).await?,
                }
                ctx.cache.reset_price_retry_count(ticker, self.as_of).await?;
                debug!("Updated price for {}: {} ({})", ticker, price, source);
                return Ok(TickerOutcome::Updated);
            }

            attempts = ctx
                .cache
                .increment_price_retry_count(ticker, self.as_of)
                .await?;
        }

        warn!(
            "Giving up on {} after {} attempts{}",
            ticker,
            attempts,
            self.as_of
                .map(|d| format!(" for {}", d))
                .unwrap_or_default()
        );
        Ok(TickerOutcome::Exhausted)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
