use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The built-in quote sources.
///
/// The string form is the identifier used in configuration, cache entries
/// and quote provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Yahoo Finance chart API
    #[serde(rename = "yfinance")]
    Yahoo,
    /// TradingView scanner API
    #[serde(rename = "tradingview")]
    TradingView,
    /// Alpha Vantage REST API (requires an API key)
    AlphaVantage,
    /// Stooq CSV service
    Stooq,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Yahoo,
        SourceKind::TradingView,
        SourceKind::AlphaVantage,
        SourceKind::Stooq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Yahoo => "yfinance",
            SourceKind::TradingView => "tradingview",
            SourceKind::AlphaVantage => "alpha_vantage",
            SourceKind::Stooq => "stooq",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yfinance" | "yahoo" => Ok(SourceKind::Yahoo),
            "tradingview" => Ok(SourceKind::TradingView),
            "alpha_vantage" | "alphavantage" => Ok(SourceKind::AlphaVantage),
            "stooq" => Ok(SourceKind::Stooq),
            other => Err(format!("Unknown price source: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        assert_eq!(" TradingView ".parse::<SourceKind>(), Ok(SourceKind::TradingView));
        assert_eq!("YFINANCE".parse::<SourceKind>(), Ok(SourceKind::Yahoo));
        assert_eq!("AlphaVantage".parse::<SourceKind>(), Ok(SourceKind::AlphaVantage));
    }

    #[test]
    fn test_parse_unknown() {
        assert!("bloomberg".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string().parse::<SourceKind>(), Ok(kind));
        }
    }
}
