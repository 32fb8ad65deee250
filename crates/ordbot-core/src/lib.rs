//! Core domain types for the ordbot order-execution engine.
//!
//! This crate provides the types shared by every other crate:
//! - `Price`, `Size`: precision-safe numeric types
//! - `OrderRequest`, `Strategy`: what the caller asks for
//! - `OrderResult`, `TwapResult`, `ExecutionOutcome`: what the engine returns
//! - `Clock`: injectable wall clock

pub mod clock;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod order;

pub use clock::{Clock, SystemClock, TimeOffset};
pub use decimal::{parse_price, parse_size, Price, Size};
pub use error::{CoreError, Result};
pub use execution::{
    aggregate_status, ExecutionOutcome, OrderResult, OrderStatus, TwapInterruption, TwapResult,
};
pub use order::{ClientOrderId, OrderRequest, OrderSide, OrderType, Strategy, TimeInForce};
