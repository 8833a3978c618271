use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use pricecache_core::settings::{
    PriceSettings, DEFAULT_CURRENT_TTL, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_COUNTER_TTL,
};
use pricecache_market_data::{DEFAULT_MIN_PLAUSIBLE_PRICE, DEFAULT_SOURCE_TIMEOUT};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15 * 60;

pub struct Config {
    pub price: PriceSettings,
    pub workers: usize,
    pub tracked_tickers: Vec<String>,
    pub refresh_interval: Duration,
    pub redis_url: Option<String>,
    pub alpha_vantage_key: Option<String>,
}

impl Config {
    /// Reads the process environment. `.env` is loaded by `main` beforehand.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let price = PriceSettings {
            source_priority: lookup("PC_SOURCE_PRIORITY")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            max_attempts: parse_or(&lookup, "PC_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            current_ttl: Duration::from_secs(parse_or(
                &lookup,
                "PC_CURRENT_TTL_SECS",
                DEFAULT_CURRENT_TTL.as_secs(),
            )),
            min_plausible_price: parse_or::<Decimal>(
                &lookup,
                "PC_MIN_PLAUSIBLE_PRICE",
                DEFAULT_MIN_PLAUSIBLE_PRICE,
            ),
            source_timeout: Duration::from_millis(parse_or(
                &lookup,
                "PC_SOURCE_TIMEOUT_MS",
                DEFAULT_SOURCE_TIMEOUT.as_millis() as u64,
            )),
            retry_counter_ttl: Some(DEFAULT_RETRY_COUNTER_TTL),
        };

        Self {
            price,
            workers: parse_or(&lookup, "PC_WORKERS", DEFAULT_WORKERS),
            tracked_tickers: lookup("PC_TRACKED_TICKERS")
                .map(|v| {
                    split_list(&v)
                        .into_iter()
                        .map(|t| t.to_uppercase())
                        .collect()
                })
                .unwrap_or_default(),
            refresh_interval: Duration::from_secs(parse_or(
                &lookup,
                "PC_REFRESH_INTERVAL_SECS",
                DEFAULT_REFRESH_INTERVAL_SECS,
            )),
            redis_url: non_empty(lookup("PC_REDIS_URL")),
            alpha_vantage_key: non_empty(lookup("ALPHA_VANTAGE_API_KEY")),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}='{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
