//! Order-related types and identifiers.
//!
//! Provides order side, order type, time-in-force, client order IDs and the
//! caller-facing [`OrderRequest`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::{Price, Size};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire representation (`BUY` / `SELL`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Immediate execution at the prevailing price.
    Market,
    /// Resting order at a fixed price.
    Limit,
    /// Time-sliced sequence of market orders.
    Twap,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::Twap => "TWAP",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    #[default]
    #[serde(rename = "GTC")]
    GoodTilCancelled,
    /// Immediate-or-cancel.
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    /// Fill-or-kill.
    #[serde(rename = "FOK")]
    FillOrKill,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoodTilCancelled => "GTC",
            Self::ImmediateOrCancel => "IOC",
            Self::FillOrKill => "FOK",
        }
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client order ID.
///
/// Sent as `newClientOrderId` and kept identical across retries of the same
/// order, so a resubmission after an ambiguous failure cannot open a second
/// position unnoticed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Highest slice index whose suffix still fits the 36-char limit.
    pub const MAX_SLICES: u32 = 99_999;

    /// Create a new unique client order ID.
    ///
    /// Format: `ordbot_{timestamp_ms}_{uuid_short}` (29 chars). A slice
    /// suffix up to `_s{MAX_SLICES}` keeps it within the exchange's
    /// 36-char limit.
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("ordbot_{ts}_{uuid_short}"))
    }

    /// Derive the ID of TWAP slice `index` (1-based) from a parent ID.
    pub fn for_slice(&self, index: u32) -> Self {
        Self(format!("{}_s{index}", self.0))
    }

    /// Create from an existing string (for parsing responses).
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientOrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientOrderId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl AsRef<str> for ClientOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strategy-specific parameters.
///
/// Encodes "price present iff LIMIT" and "slices/interval present iff TWAP"
/// in the type rather than as optional fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Market,
    Limit {
        price: Price,
        time_in_force: TimeInForce,
    },
    Twap {
        slices: u32,
        interval: Duration,
    },
}

impl Strategy {
    pub fn order_type(&self) -> OrderType {
        match self {
            Self::Market => OrderType::Market,
            Self::Limit { .. } => OrderType::Limit,
            Self::Twap { .. } => OrderType::Twap,
        }
    }
}

/// A single logical order as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Trading pair (e.g., "BTCUSDT").
    pub symbol: String,
    pub side: OrderSide,
    /// Total quantity (for TWAP, the sum over all slices).
    pub quantity: Size,
    pub strategy: Strategy,
    /// Only reduce an existing position.
    pub reduce_only: bool,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Size) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            strategy: Strategy::Market,
            reduce_only: false,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Size,
        price: Price,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            strategy: Strategy::Limit {
                price,
                time_in_force,
            },
            reduce_only: false,
        }
    }

    pub fn twap(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Size,
        slices: u32,
        interval: Duration,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            strategy: Strategy::Twap { slices, interval },
            reduce_only: false,
        }
    }

    #[must_use]
    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }

    pub fn order_type(&self) -> OrderType {
        self.strategy.order_type()
    }

    /// Limit price, if this is a LIMIT order.
    pub fn price(&self) -> Option<Price> {
        match self.strategy {
            Strategy::Limit { price, .. } => Some(price),
            _ => None,
        }
    }
}
