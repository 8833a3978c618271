//! Yahoo Finance API response models.
//!
//! Only the `price` module of the quoteSummary API is used, as the backup
//! path when the chart endpoint has no quote for a symbol.

use serde::Deserialize;

/// Main response wrapper for quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResponse {
    pub quote_summary: YahooQuoteSummary,
}

/// Quote summary container
#[derive(Debug, Deserialize)]
pub struct YahooQuoteSummary {
    pub result: Vec<YahooQuoteSummaryResult>,
}

/// Individual result from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooQuoteSummaryResult {
    pub price: Option<YahooPriceData>,
}

/// Price data from quoteSummary API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooPriceData {
    pub currency: Option<String>,
    pub regular_market_price: Option<YahooPriceDetail>,
    pub regular_market_time: Option<i64>,
}

/// Price detail with raw and formatted values
#[derive(Debug, Deserialize, Clone)]
pub struct YahooPriceDetail {
    pub raw: Option<f64>,
}
