//! Pre-submission order checks.
//!
//! # Check Order (Strict)
//!
//! 1. symbol non-empty                 → `EmptySymbol`
//! 2. quantity > 0                     → `NonPositiveQuantity`
//! 3. LIMIT: price > 0                 → `NonPositivePrice`
//! 4. TWAP: 1 ≤ slices ≤ 99 999        → `InvalidSliceCount`
//!    TWAP: interval > 0               → `InvalidInterval`
//!    TWAP: every planned slice > 0    → `EmptySlice`
//! 5. notional ≥ min_notional          → `BelowMinNotional`
//!
//! Checks 1-4 need no market data. Check 5 uses the limit price, or the
//! reference price for MARKET/TWAP; with no reference price it is skipped.

use ordbot_core::{ClientOrderId, OrderRequest, Price, Size, Strategy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ValidationError;
use crate::twap::plan_slices;

/// What to do when an order is below the minimum notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotionalGuard {
    /// Reject with `BelowMinNotional`.
    #[default]
    Enforce,
    /// Log at WARN and submit anyway.
    Warn,
    /// Skip the check.
    Off,
    /// Raise MARKET/LIMIT quantity up to the minimum; TWAP is enforced.
    Adjust,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum notional in quote units.
    #[serde(default = "default_min_notional")]
    pub min_notional: Decimal,
    #[serde(default)]
    pub notional_guard: NotionalGuard,
}

fn default_min_notional() -> Decimal {
    Decimal::from(100)
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_notional: default_min_notional(),
            notional_guard: NotionalGuard::default(),
        }
    }
}

/// Validates orders before anything is signed.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    config: ValidationConfig,
    quantity_step: Option<Size>,
}

impl OrderValidator {
    pub fn new(config: ValidationConfig, quantity_step: Option<Size>) -> Self {
        Self {
            config,
            quantity_step,
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// True if check 5 needs a market reference price for this request.
    pub fn needs_reference_price(&self, request: &OrderRequest) -> bool {
        self.config.notional_guard != NotionalGuard::Off && request.price().is_none()
    }

    /// Run all checks in order.
    pub fn validate(
        &self,
        request: &OrderRequest,
        reference_price: Option<Price>,
    ) -> Result<(), ValidationError> {
        self.check_shape(request)?;
        self.check_notional(request, reference_price)
    }

    /// Checks 1-4.
    pub fn check_shape(&self, request: &OrderRequest) -> Result<(), ValidationError> {
        if request.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        if !request.quantity.is_positive() {
            return Err(ValidationError::NonPositiveQuantity(request.quantity));
        }

        match request.strategy {
            Strategy::Market => {}
            Strategy::Limit { price, .. } => {
                if !price.is_positive() {
                    return Err(ValidationError::NonPositivePrice(price));
                }
            }
            Strategy::Twap { slices, interval } => {
                if slices == 0 || slices > ClientOrderId::MAX_SLICES {
                    return Err(ValidationError::InvalidSliceCount(slices));
                }
                if interval.is_zero() {
                    return Err(ValidationError::InvalidInterval);
                }
                let plan = plan_slices(request.quantity, slices, self.quantity_step);
                if let Some((position, quantity)) =
                    plan.iter().enumerate().find(|(_, q)| !q.is_positive())
                {
                    return Err(ValidationError::EmptySlice {
                        index: position as u32 + 1,
                        quantity: *quantity,
                    });
                }
            }
        }

        Ok(())
    }

    /// Check 5.
    pub fn check_notional(
        &self,
        request: &OrderRequest,
        reference_price: Option<Price>,
    ) -> Result<(), ValidationError> {
        if self.config.notional_guard == NotionalGuard::Off {
            return Ok(());
        }

        let Some(price) = request.price().or(reference_price) else {
            warn!(symbol = %request.symbol, "No reference price, skipping notional check");
            return Ok(());
        };

        // Each TWAP slice is a separate order; the smallest planned one must clear the minimum
        let checked_quantity = match request.strategy {
            Strategy::Twap { slices, .. } => plan_slices(request.quantity, slices, self.quantity_step)
                .into_iter()
                .min()
                .unwrap_or(request.quantity),
            _ => request.quantity,
        };
        let notional = checked_quantity.notional(price);
        if notional >= self.config.min_notional {
            return Ok(());
        }

        if self.config.notional_guard == NotionalGuard::Warn {
            warn!(
                symbol = %request.symbol,
                notional = %notional,
                min_notional = %self.config.min_notional,
                "Order below minimum notional, submitting anyway"
            );
            return Ok(());
        }

        Err(ValidationError::BelowMinNotional {
            notional,
            min_notional: self.config.min_notional,
        })
    }

    /// Raise a MARKET/LIMIT quantity to the minimum notional when the guard
    /// is `Adjust`. Any other request is returned unchanged.
    pub fn adjust_quantity(&self, mut request: OrderRequest, reference_price: Option<Price>) -> OrderRequest {
        if self.config.notional_guard != NotionalGuard::Adjust
            || matches!(request.strategy, Strategy::Twap { .. })
        {
            return request;
        }
        let Some(price) = request.price().or(reference_price) else {
            return request;
        };
        if !price.is_positive() || !request.quantity.is_positive() {
            return request;
        }
        if request.quantity.notional(price) >= self.config.min_notional {
            return request;
        }

        let raw = Size::new(self.config.min_notional / price.inner());
        let adjusted = match self.quantity_step {
            Some(step) if step.is_positive() => raw.round_up_to_step(step),
            _ => Size::new(raw.inner().round_dp_with_strategy(
                crate::twap::DEFAULT_SLICE_DP,
                rust_decimal::RoundingStrategy::AwayFromZero,
            )),
        };

        info!(
            symbol = %request.symbol,
            from = %request.quantity,
            to = %adjusted,
            price = %price,
            "Raised quantity to minimum notional"
        );
        request.quantity = adjusted;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordbot_core::{OrderSide, TimeInForce};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn validator(guard: NotionalGuard) -> OrderValidator {
        OrderValidator::new(
            ValidationConfig {
                min_notional: dec!(100),
                notional_guard: guard,
            },
            Some(Size::new(dec!(0.001))),
        )
    }

    fn market(qty: Decimal) -> OrderRequest {
        OrderRequest::market("BTCUSDT", OrderSide::Buy, Size::new(qty))
    }

    fn price(p: Decimal) -> Option<Price> {
        Some(Price::new(p))
    }

    #[test]
    fn test_accepts_reasonable_market_order() {
        let v = validator(NotionalGuard::Enforce);
        assert_eq!(v.validate(&market(dec!(0.01)), price(dec!(30000))), Ok(()));
    }

    #[test]
    fn test_empty_symbol_checked_first() {
        let v = validator(NotionalGuard::Enforce);
        let mut request = market(dec!(0));
        request.symbol = "  ".to_string();
        assert_eq!(v.validate(&request, None), Err(ValidationError::EmptySymbol));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let v = validator(NotionalGuard::Enforce);
        assert_eq!(
            v.validate(&market(dec!(0)), price(dec!(30000))),
            Err(ValidationError::NonPositiveQuantity(Size::ZERO))
        );
    }

    #[test]
    fn test_negative_limit_price_rejected() {
        let v = validator(NotionalGuard::Enforce);
        let request = OrderRequest::limit(
            "BTCUSDT",
            OrderSide::Sell,
            Size::new(dec!(0.01)),
            Price::new(dec!(-1)),
            TimeInForce::GoodTilCancelled,
        );
        assert_eq!(
            v.check_shape(&request),
            Err(ValidationError::NonPositivePrice(Price::new(dec!(-1))))
        );
    }

    #[test]
    fn test_twap_shape_checks() {
        let v = validator(NotionalGuard::Off);
        let qty = Size::new(dec!(0.01));

        let zero_slices = OrderRequest::twap("BTCUSDT", OrderSide::Buy, qty, 0, Duration::from_secs(1));
        assert_eq!(
            v.check_shape(&zero_slices),
            Err(ValidationError::InvalidSliceCount(0))
        );

        let zero_interval = OrderRequest::twap("BTCUSDT", OrderSide::Buy, qty, 5, Duration::ZERO);
        assert_eq!(v.check_shape(&zero_interval), Err(ValidationError::InvalidInterval));

        let tiny = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.002)),
            5,
            Duration::from_secs(1),
        );
        assert!(matches!(
            v.check_shape(&tiny),
            Err(ValidationError::EmptySlice { index: 1, .. })
        ));
    }

    #[test]
    fn test_below_min_notional_enforced() {
        let v = validator(NotionalGuard::Enforce);
        let err = v
            .validate(&market(dec!(0.0001)), price(dec!(1000)))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::BelowMinNotional {
                notional: dec!(0.1),
                min_notional: dec!(100),
            }
        );
    }

    #[test]
    fn test_limit_uses_own_price() {
        let v = validator(NotionalGuard::Enforce);
        let request = OrderRequest::limit(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.001)),
            Price::new(dec!(1000)),
            TimeInForce::GoodTilCancelled,
        );
        // Reference price ignored in favour of the limit price
        assert!(v.validate(&request, price(dec!(1_000_000))).is_err());
        assert!(!v.needs_reference_price(&request));
    }

    #[test]
    fn test_twap_notional_is_per_slice() {
        let v = validator(NotionalGuard::Enforce);
        let request = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.01)),
            5,
            Duration::from_secs(10),
        );
        // 0.01 * 30000 = 300 total, but 60 per slice
        assert!(v.validate(&request, price(dec!(30000))).is_err());
        assert!(v.validate(&request, price(dec!(60000))).is_ok());
    }

    #[test]
    fn test_twap_notional_uses_rounded_slices() {
        let v = validator(NotionalGuard::Enforce);
        let request = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.0099)),
            3,
            Duration::from_secs(10),
        );
        // Plan is 0.003 / 0.003 / 0.0039: the leading slices are worth 93,
        // although 0.0033 per slice would be 102.3
        assert_eq!(
            v.validate(&request, price(dec!(31000))),
            Err(ValidationError::BelowMinNotional {
                notional: dec!(93),
                min_notional: dec!(100),
            })
        );
    }

    #[test]
    fn test_twap_slice_count_capped() {
        let v = validator(NotionalGuard::Off);
        let request = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(1000)),
            ClientOrderId::MAX_SLICES + 1,
            Duration::from_secs(1),
        );
        assert_eq!(
            v.check_shape(&request),
            Err(ValidationError::InvalidSliceCount(100_000))
        );

        let at_cap = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(1000)),
            ClientOrderId::MAX_SLICES,
            Duration::from_secs(1),
        );
        assert_eq!(v.check_shape(&at_cap), Ok(()));
    }

    #[test]
    fn test_unknown_reference_price_skips_notional() {
        let v = validator(NotionalGuard::Enforce);
        assert_eq!(v.validate(&market(dec!(0.0001)), None), Ok(()));
    }

    #[test]
    fn test_warn_and_off_modes_pass() {
        for guard in [NotionalGuard::Warn, NotionalGuard::Off] {
            let v = validator(guard);
            assert_eq!(v.validate(&market(dec!(0.0001)), price(dec!(1000))), Ok(()));
        }
        assert!(!validator(NotionalGuard::Off).needs_reference_price(&market(dec!(1))));
    }

    #[test]
    fn test_adjust_raises_quantity_to_step() {
        let v = validator(NotionalGuard::Adjust);
        let adjusted = v.adjust_quantity(market(dec!(0.001)), price(dec!(30000)));

        // 100 / 30000 = 0.00333.. -> 0.004
        assert_eq!(adjusted.quantity, Size::new(dec!(0.004)));
        assert_eq!(v.validate(&adjusted, price(dec!(30000))), Ok(()));
    }

    #[test]
    fn test_adjust_leaves_large_and_twap_orders_alone() {
        let v = validator(NotionalGuard::Adjust);
        let large = market(dec!(1));
        assert_eq!(v.adjust_quantity(large.clone(), price(dec!(30000))), large);

        let twap = OrderRequest::twap(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.001)),
            2,
            Duration::from_secs(1),
        );
        assert_eq!(v.adjust_quantity(twap.clone(), price(dec!(30000))), twap);
    }
}
