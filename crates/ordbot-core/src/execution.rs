//! Execution result types.
//!
//! This module provides:
//! - `OrderStatus`: terminal status of a single exchange order
//! - `OrderResult`: uniform envelope for one submitted order
//! - `TwapResult`: per-slice results plus aggregate status
//! - `ExecutionOutcome`: what the engine hands back to the caller

use serde::{Deserialize, Serialize};

use crate::order::{ClientOrderId, OrderSide, OrderType};
use crate::{Price, Size};

// ============================================================================
// OrderStatus
// ============================================================================

/// Status of an order as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted and resting, nothing executed yet.
    New,
    /// Completely filled.
    Filled,
    /// Some quantity executed, some did not.
    PartiallyFilled,
    /// Refused by the exchange without execution.
    Rejected,
    /// Submission failed locally or was aborted.
    Error,
}

impl OrderStatus {
    /// Map an exchange status string onto the five caller-facing statuses.
    ///
    /// Terminal-but-unfilled exchange states (cancelled, expired) become
    /// `PartiallyFilled` when something executed before the order ended and
    /// `Rejected` otherwise.
    pub fn from_exchange(status: &str, executed: Size) -> Self {
        match status {
            "NEW" => Self::New,
            "FILLED" => Self::Filled,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "REJECTED" => Self::Rejected,
            "CANCELED" | "EXPIRED" | "EXPIRED_IN_MATCH" => {
                if executed.is_positive() {
                    Self::PartiallyFilled
                } else {
                    Self::Rejected
                }
            }
            _ => Self::Error,
        }
    }

    /// True if any quantity executed.
    #[must_use]
    pub fn has_fill(&self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Filled => "FILLED",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Rejected => "REJECTED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

// ============================================================================
// OrderResult
// ============================================================================

/// Result of one submitted order (or one TWAP slice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResult {
    /// Exchange order ID. `None` when the order never reached the book.
    pub order_id: Option<i64>,
    pub client_order_id: ClientOrderId,
    pub symbol: String,
    pub status: OrderStatus,
    pub side: OrderSide,
    pub order_type: OrderType,
    /// Quantity submitted.
    pub quantity: Size,
    pub executed_quantity: Size,
    /// Volume-weighted fill price; `None` if nothing executed.
    pub average_price: Option<Price>,
    /// Exchange response body (or the error description for `Error` results).
    pub raw_response: serde_json::Value,
}

impl OrderResult {
    /// Build an `Error` entry for an order that failed before a usable
    /// exchange acknowledgement was received.
    pub fn errored(
        client_order_id: ClientOrderId,
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        quantity: Size,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            order_id: None,
            client_order_id,
            symbol: symbol.into(),
            status: OrderStatus::Error,
            side,
            order_type,
            quantity,
            executed_quantity: Size::ZERO,
            average_price: None,
            raw_response: serde_json::json!({ "error": reason.into() }),
        }
    }
}

// ============================================================================
// TwapResult
// ============================================================================

/// Why a TWAP schedule stopped before its last slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TwapInterruption {
    /// Shutdown requested during an inter-slice wait.
    Cancelled,
    /// A slice failed fatally; remaining slices were not submitted.
    Aborted { reason: String },
}

/// Aggregate result of a TWAP schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapResult {
    pub symbol: String,
    pub side: OrderSide,
    pub requested_quantity: Size,
    pub planned_slices: u32,
    /// Per-slice results in submission order.
    pub slices: Vec<OrderResult>,
    pub status: OrderStatus,
    pub interruption: Option<TwapInterruption>,
}

impl TwapResult {
    /// Sum of executed quantity over all slices.
    pub fn executed_quantity(&self) -> Size {
        self.slices.iter().map(|s| s.executed_quantity).sum()
    }

    /// True if every planned slice was submitted.
    pub fn is_complete(&self) -> bool {
        self.interruption.is_none() && self.slices.len() == self.planned_slices as usize
    }
}

/// Derive the aggregate status of a TWAP run.
///
/// Rules, first match wins:
/// 1. no slices → `Error`
/// 2. every planned slice submitted and `Filled` → `Filled`
/// 3. some slice has a fill, and some slice does not or the schedule was
///    cut short → `PartiallyFilled`
/// 4. no fill, at least one `Error` → `Error`
/// 5. every slice `Rejected` → `Rejected`
/// 6. otherwise (e.g. all resting) → `New`
pub fn aggregate_status(slices: &[OrderResult], planned_slices: u32) -> OrderStatus {
    if slices.is_empty() {
        return OrderStatus::Error;
    }

    let complete = slices.len() >= planned_slices as usize;
    let all_filled = slices.iter().all(|s| s.status == OrderStatus::Filled);
    if all_filled && complete {
        return OrderStatus::Filled;
    }

    if slices.iter().any(|s| s.status.has_fill()) {
        return OrderStatus::PartiallyFilled;
    }

    if slices.iter().any(|s| s.status == OrderStatus::Error) {
        return OrderStatus::Error;
    }

    if slices.iter().all(|s| s.status == OrderStatus::Rejected) {
        return OrderStatus::Rejected;
    }

    OrderStatus::New
}

// ============================================================================
// ExecutionOutcome
// ============================================================================

/// Uniform envelope returned by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Single(OrderResult),
    Twap(TwapResult),
}

impl ExecutionOutcome {
    pub fn status(&self) -> OrderStatus {
        match self {
            Self::Single(r) => r.status,
            Self::Twap(t) => t.status,
        }
    }

    pub fn executed_quantity(&self) -> Size {
        match self {
            Self::Single(r) => r.executed_quantity,
            Self::Twap(t) => t.executed_quantity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn slice(status: OrderStatus, executed: Size) -> OrderResult {
        OrderResult {
            order_id: Some(1),
            client_order_id: ClientOrderId::from_string("test".to_string()),
            symbol: "BTCUSDT".to_string(),
            status,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: Size::new(dec!(0.002)),
            executed_quantity: executed,
            average_price: None,
            raw_response: serde_json::Value::Null,
        }
    }

    fn filled() -> OrderResult {
        slice(OrderStatus::Filled, Size::new(dec!(0.002)))
    }

    #[test]
    fn test_status_from_exchange() {
        assert_eq!(OrderStatus::from_exchange("FILLED", Size::ZERO), OrderStatus::Filled);
        assert_eq!(OrderStatus::from_exchange("NEW", Size::ZERO), OrderStatus::New);
        assert_eq!(
            OrderStatus::from_exchange("EXPIRED", Size::ZERO),
            OrderStatus::Rejected
        );
        assert_eq!(
            OrderStatus::from_exchange("CANCELED", Size::new(dec!(0.001))),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(OrderStatus::from_exchange("???", Size::ZERO), OrderStatus::Error);
    }

    #[test]
    fn test_aggregate_all_filled() {
        let slices = vec![filled(), filled(), filled()];
        assert_eq!(aggregate_status(&slices, 3), OrderStatus::Filled);
    }

    #[test]
    fn test_aggregate_filled_but_cut_short() {
        let slices = vec![filled(), filled()];
        assert_eq!(aggregate_status(&slices, 5), OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_aggregate_fill_then_error() {
        let slices = vec![filled(), slice(OrderStatus::Error, Size::ZERO)];
        assert_eq!(aggregate_status(&slices, 5), OrderStatus::PartiallyFilled);
    }

    #[test]
    fn test_aggregate_error_without_fill() {
        let slices = vec![
            slice(OrderStatus::Rejected, Size::ZERO),
            slice(OrderStatus::Error, Size::ZERO),
        ];
        assert_eq!(aggregate_status(&slices, 5), OrderStatus::Error);
    }

    #[test]
    fn test_aggregate_all_rejected() {
        let slices = vec![
            slice(OrderStatus::Rejected, Size::ZERO),
            slice(OrderStatus::Rejected, Size::ZERO),
        ];
        assert_eq!(aggregate_status(&slices, 2), OrderStatus::Rejected);
    }

    #[test]
    fn test_aggregate_resting_and_empty() {
        let slices = vec![slice(OrderStatus::New, Size::ZERO)];
        assert_eq!(aggregate_status(&slices, 1), OrderStatus::New);
        assert_eq!(aggregate_status(&[], 3), OrderStatus::Error);
    }

    #[test]
    fn test_twap_executed_quantity() {
        let result = TwapResult {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            requested_quantity: Size::new(dec!(0.004)),
            planned_slices: 2,
            slices: vec![filled(), filled()],
            status: OrderStatus::Filled,
            interruption: None,
        };
        assert_eq!(result.executed_quantity(), Size::new(dec!(0.004)));
        assert!(result.is_complete());
    }
}
