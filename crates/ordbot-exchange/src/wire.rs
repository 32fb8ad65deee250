//! Exchange REST payloads.
//!
//! Decoding happens here so that a response missing a required field is
//! reported as [`TransportError::Malformed`] in one place.

use ordbot_core::{ClientOrderId, OrderResult, OrderSide, OrderStatus, OrderType, Price, Size};
use serde::{Deserialize, Serialize};

use crate::error::{TransportError, TransportResult};

/// `GET /fapi/v1/time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTimeResponse {
    pub server_time: u64,
}

/// `GET /fapi/v1/ticker/price`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    pub price: Price,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Acknowledgement of `POST /fapi/v1/order` with `newOrderRespType=RESULT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    pub client_order_id: String,
    pub side: OrderSide,
    pub orig_qty: Size,
    #[serde(default)]
    pub executed_qty: Size,
    /// `"0"` or `"0.00000"` until something executes.
    #[serde(default)]
    pub avg_price: Option<Price>,
}

impl OrderAck {
    /// Decode an acknowledgement from a raw response body.
    ///
    /// # Errors
    /// `TransportError::Malformed` if a required field is missing or has the
    /// wrong shape.
    pub fn from_value(raw: &serde_json::Value) -> TransportResult<Self> {
        Self::deserialize(raw)
            .map_err(|e| TransportError::Malformed(format!("order acknowledgement: {e}")))
    }

    /// Average fill price, `None` while nothing has executed.
    pub fn fill_price(&self) -> Option<Price> {
        self.avg_price.filter(|p| p.is_positive())
    }

    /// Convert into the caller-facing result, keeping `raw` verbatim.
    pub fn into_order_result(self, order_type: OrderType, raw: serde_json::Value) -> OrderResult {
        let status = OrderStatus::from_exchange(&self.status, self.executed_qty);
        let average_price = self.fill_price();
        OrderResult {
            order_id: Some(self.order_id),
            client_order_id: ClientOrderId::from_string(self.client_order_id),
            symbol: self.symbol,
            status,
            side: self.side,
            order_type,
            quantity: self.orig_qty,
            executed_quantity: self.executed_qty,
            average_price,
            raw_response: raw,
        }
    }
}
