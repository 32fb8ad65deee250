//! TWAP slicing and schedule state.
//!
//! # Slicing
//! Each slice is `total / slices` rounded down to the quantity step; the
//! final slice takes whatever is left, so the plan always sums to the
//! requested total exactly.

use ordbot_core::{
    aggregate_status, ClientOrderId, OrderResult, OrderSide, Size, TwapInterruption, TwapResult,
};
use rust_decimal::Decimal;

/// Decimal places used when no quantity step is configured.
pub const DEFAULT_SLICE_DP: u32 = 8;

/// Split `total` into `slices` quantities.
///
/// Returns an empty plan for zero slices. Individual slices may be zero if
/// `total` is smaller than `slices` steps; the validator rejects such plans.
pub fn plan_slices(total: Size, slices: u32, step: Option<Size>) -> Vec<Size> {
    if slices == 0 {
        return Vec::new();
    }

    let even = total / Decimal::from(slices);
    let base = match step {
        Some(step) if step.is_positive() => even.round_down_to_step(step),
        _ => even.truncate_dp(DEFAULT_SLICE_DP),
    };

    let leading = slices - 1;
    let last = total - base * Decimal::from(leading);

    let mut plan = vec![base; leading as usize];
    plan.push(last);
    plan
}

/// One slice ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwapSlice {
    /// 1-based position in the schedule.
    pub index: u32,
    pub quantity: Size,
    pub client_order_id: ClientOrderId,
}

/// Progress of a TWAP schedule.
///
/// ```text
/// Idle -> (next_slice -> record)* -> finish
///            \-> cancel / abort --------^
/// ```
#[derive(Debug)]
pub struct TwapRun {
    parent_id: ClientOrderId,
    plan: Vec<Size>,
    results: Vec<OrderResult>,
    interruption: Option<TwapInterruption>,
}

impl TwapRun {
    pub fn new(parent_id: ClientOrderId, plan: Vec<Size>) -> Self {
        let capacity = plan.len();
        Self {
            parent_id,
            plan,
            results: Vec::with_capacity(capacity),
            interruption: None,
        }
    }

    pub fn planned(&self) -> u32 {
        self.plan.len() as u32
    }

    pub fn submitted(&self) -> usize {
        self.results.len()
    }

    /// Next slice to submit, or `None` once the schedule is over.
    pub fn next_slice(&self) -> Option<TwapSlice> {
        if self.interruption.is_some() {
            return None;
        }
        let position = self.results.len();
        let quantity = *self.plan.get(position)?;
        let index = position as u32 + 1;
        Some(TwapSlice {
            index,
            quantity,
            client_order_id: self.parent_id.for_slice(index),
        })
    }

    /// True if a wait is due before the next slice.
    pub fn needs_wait(&self) -> bool {
        !self.results.is_empty() && self.next_slice().is_some()
    }

    pub fn record(&mut self, result: OrderResult) {
        self.results.push(result);
    }

    /// Stop after a fatal slice failure.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.interruption = Some(TwapInterruption::Aborted {
            reason: reason.into(),
        });
    }

    /// Stop on shutdown request.
    pub fn cancel(&mut self) {
        self.interruption = Some(TwapInterruption::Cancelled);
    }

    pub fn finish(self, symbol: impl Into<String>, side: OrderSide, requested: Size) -> TwapResult {
        let planned_slices = self.planned();
        let status = aggregate_status(&self.results, planned_slices);
        TwapResult {
            symbol: symbol.into(),
            side,
            requested_quantity: requested,
            planned_slices,
            slices: self.results,
            status,
            interruption: self.interruption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordbot_core::{OrderStatus, OrderType};
    use rust_decimal_macros::dec;

    fn size(d: Decimal) -> Size {
        Size::new(d)
    }

    fn filled(quantity: Size) -> OrderResult {
        OrderResult {
            order_id: Some(1),
            client_order_id: ClientOrderId::from_string("p_s1".to_string()),
            symbol: "BTCUSDT".to_string(),
            status: OrderStatus::Filled,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity,
            executed_quantity: quantity,
            average_price: None,
            raw_response: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_even_split() {
        let plan = plan_slices(size(dec!(0.01)), 5, Some(size(dec!(0.001))));
        assert_eq!(plan, vec![size(dec!(0.002)); 5]);
    }

    #[test]
    fn test_remainder_goes_to_last_slice() {
        let plan = plan_slices(size(dec!(0.01)), 3, Some(size(dec!(0.001))));
        assert_eq!(
            plan,
            vec![size(dec!(0.003)), size(dec!(0.003)), size(dec!(0.004))]
        );
    }

    #[test]
    fn test_plan_sums_to_total() {
        let cases = [
            (dec!(0.01), 3u32, Some(dec!(0.001))),
            (dec!(1), 7, Some(dec!(0.001))),
            (dec!(1), 7, None),
            (dec!(0.123456789), 4, None),
            (dec!(25), 1, Some(dec!(0.5))),
        ];

        for (total, slices, step) in cases {
            let plan = plan_slices(size(total), slices, step.map(size));
            assert_eq!(plan.len(), slices as usize);
            let sum: Size = plan.iter().sum();
            assert_eq!(sum, size(total), "total={total} slices={slices}");
        }
    }

    #[test]
    fn test_no_step_truncates_to_eight_places() {
        let plan = plan_slices(size(dec!(1)), 3, None);
        assert_eq!(plan[0], size(dec!(0.33333333)));
        assert_eq!(plan[2], size(dec!(0.33333334)));
    }

    #[test]
    fn test_tiny_total_yields_zero_leading_slices() {
        let plan = plan_slices(size(dec!(0.002)), 5, Some(size(dec!(0.001))));
        assert!(plan[0].is_zero());
        assert_eq!(plan[4], size(dec!(0.002)));
    }

    #[test]
    fn test_zero_slices_is_empty() {
        assert!(plan_slices(size(dec!(1)), 0, None).is_empty());
    }

    #[test]
    fn test_run_walks_schedule() {
        let parent = ClientOrderId::from_string("parent".to_string());
        let mut run = TwapRun::new(parent, vec![size(dec!(0.002)); 2]);

        assert!(!run.needs_wait());
        let first = run.next_slice().unwrap();
        assert_eq!(first.index, 1);
        assert_eq!(first.client_order_id.as_str(), "parent_s1");
        run.record(filled(first.quantity));

        assert!(run.needs_wait());
        let second = run.next_slice().unwrap();
        assert_eq!(second.index, 2);
        run.record(filled(second.quantity));

        assert!(run.next_slice().is_none());
        assert!(!run.needs_wait());

        let result = run.finish("BTCUSDT", OrderSide::Buy, size(dec!(0.004)));
        assert_eq!(result.status, OrderStatus::Filled);
        assert!(result.is_complete());
    }

    #[test]
    fn test_cancel_stops_schedule() {
        let parent = ClientOrderId::from_string("parent".to_string());
        let mut run = TwapRun::new(parent, vec![size(dec!(0.002)); 3]);
        run.record(filled(size(dec!(0.002))));
        run.cancel();

        assert!(run.next_slice().is_none());
        let result = run.finish("BTCUSDT", OrderSide::Buy, size(dec!(0.006)));
        assert_eq!(result.status, OrderStatus::PartiallyFilled);
        assert_eq!(result.interruption, Some(TwapInterruption::Cancelled));
        assert_eq!(result.slices.len(), 1);
    }
}
