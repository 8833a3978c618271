//! Quote plausibility validation.
//!
//! A source answering with a price is not enough: some sources return
//! spurious near-zero values for unmatched or delisted symbols. Current
//! quotes are checked against the source's [`PlausibilityCheck`]; a rejected
//! value is treated exactly like "no quote" by the registry.

use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::Quote;
use crate::provider::{PlausibilityCheck, PriceSource};

/// Default minimum plausible price for sources using
/// [`PlausibilityCheck::MinimumPrice`].
pub const DEFAULT_MIN_PLAUSIBLE_PRICE: Decimal = Decimal::ONE;

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Current prices from `MinimumPrice` sources must be strictly greater
    /// than this value.
    pub min_plausible_price: Decimal,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_plausible_price: DEFAULT_MIN_PLAUSIBLE_PRICE,
        }
    }
}

/// Plausibility validator applied during the fallback walk.
#[derive(Clone, Debug, Default)]
pub struct PlausibilityValidator {
    config: ValidatorConfig,
}

impl PlausibilityValidator {
    /// Create a validator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Create a validator with the given minimum plausible price.
    pub fn with_min_price(min_plausible_price: Decimal) -> Self {
        Self::with_config(ValidatorConfig {
            min_plausible_price,
        })
    }

    pub fn min_plausible_price(&self) -> Decimal {
        self.config.min_plausible_price
    }

    /// Validate a current quote from `source`.
    ///
    /// Returns the accepted price, or an error describing why the quote
    /// counts as "no quote".
    pub fn validate_current(
        &self,
        source: &dyn PriceSource,
        quote: &Quote,
    ) -> Result<Decimal, MarketDataError> {
        let price = quote
            .price
            .ok_or_else(|| MarketDataError::SymbolNotFound(quote.ticker.clone()))?;

        let floor = match source.capabilities().plausibility {
            PlausibilityCheck::Basic => Decimal::ZERO,
            PlausibilityCheck::MinimumPrice => self.config.min_plausible_price,
        };

        if price <= floor {
            return Err(MarketDataError::ImplausiblePrice {
                provider: source.id().to_string(),
                price,
            });
        }

        Ok(price)
    }

    /// Validate a historical quote. Only a present price is required.
    pub fn validate_historical(&self, quote: &Quote) -> Result<Decimal, MarketDataError> {
        quote
            .price
            .ok_or_else(|| MarketDataError::SymbolNotFound(quote.ticker.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AsOf;
    use crate::provider::SourceCapabilities;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    struct CheckedSource(PlausibilityCheck);

    #[async_trait]
    impl PriceSource for CheckedSource {
        fn id(&self) -> &'static str {
            "checked"
        }

        fn capabilities(&self) -> SourceCapabilities {
            SourceCapabilities {
                supports_historical: true,
                plausibility: self.0,
            }
        }

        async fn fetch_current(&self, ticker: &str) -> Result<Quote, MarketDataError> {
            Err(MarketDataError::SymbolNotFound(ticker.to_string()))
        }

        async fn fetch_historical(
            &self,
            ticker: &str,
            _date: NaiveDate,
        ) -> Result<Quote, MarketDataError> {
            Err(MarketDataError::SymbolNotFound(ticker.to_string()))
        }
    }

    fn current(price: Decimal) -> Quote {
        Quote::current("TEST", price, "checked", Utc::now())
    }

    #[test]
    fn test_minimum_price_rejects_sub_unit_value() {
        let validator = PlausibilityValidator::new();
        let source = CheckedSource(PlausibilityCheck::MinimumPrice);
        let err = validator
            .validate_current(&source, &current(dec!(0.5)))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ImplausiblePrice { .. }));
    }

    #[test]
    fn test_minimum_price_is_strict() {
        let validator = PlausibilityValidator::with_min_price(dec!(2));
        let source = CheckedSource(PlausibilityCheck::MinimumPrice);
        assert!(validator.validate_current(&source, &current(dec!(2))).is_err());
        assert_eq!(
            validator
                .validate_current(&source, &current(dec!(2.01)))
                .unwrap(),
            dec!(2.01)
        );
    }

    #[test]
    fn test_basic_accepts_penny_stock() {
        let validator = PlausibilityValidator::new();
        let source = CheckedSource(PlausibilityCheck::Basic);
        assert_eq!(
            validator
                .validate_current(&source, &current(dec!(0.5)))
                .unwrap(),
            dec!(0.5)
        );
    }

    #[test]
    fn test_basic_rejects_zero_and_negative() {
        let validator = PlausibilityValidator::new();
        let source = CheckedSource(PlausibilityCheck::Basic);
        assert!(validator.validate_current(&source, &current(dec!(0))).is_err());
        assert!(validator.validate_current(&source, &current(dec!(-3))).is_err());
    }

    #[test]
    fn test_missing_price_is_rejected() {
        let validator = PlausibilityValidator::new();
        let source = CheckedSource(PlausibilityCheck::Basic);
        let quote = Quote::unavailable("TEST", AsOf::Instant(Utc::now()));
        assert!(validator.validate_current(&source, &quote).is_err());
        assert!(validator.validate_historical(&quote).is_err());
    }

    #[test]
    fn test_historical_only_requires_presence() {
        let validator = PlausibilityValidator::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let quote = Quote::historical("TEST", date, dec!(0.01), "checked");
        assert_eq!(validator.validate_historical(&quote).unwrap(), dec!(0.01));
    }
}
