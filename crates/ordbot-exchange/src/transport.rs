//! Exchange transport trait.
//!
//! The execution engine talks to the exchange only through
//! [`ExchangeTransport`], which allows for:
//! - Unit testing with the scripted [`MockTransport`]
//! - Separation of signing from HTTP plumbing
//! - Swapping testnet and production endpoints by configuration

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use ordbot_core::Price;
use parking_lot::Mutex;
use serde_json::json;

use crate::error::{TransportError, TransportResult};
use crate::signer::{QueryParams, SignedRequest};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Request/response exchange with the venue.
pub trait ExchangeTransport: Send + Sync {
    /// Current exchange time in milliseconds since epoch.
    fn server_time(&self) -> BoxFuture<'_, TransportResult<u64>>;

    /// Last traded price for `symbol`.
    fn ticker_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, TransportResult<Price>>;

    /// Submit a signed request. Resolves to the raw response body on 2xx.
    fn submit(&self, request: SignedRequest) -> BoxFuture<'_, TransportResult<serde_json::Value>>;
}

/// Arc wrapper for transport trait objects.
pub type DynTransport = Arc<dyn ExchangeTransport>;

// =============================================================================
// MockTransport
// =============================================================================

/// What the mock saw for one `submit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSubmit {
    pub endpoint: String,
    pub params: QueryParams,
    pub timestamp: u64,
    pub body: String,
}

/// Scripted transport for tests.
///
/// Responses are taken from per-endpoint queues. When the submit queue is
/// empty the mock answers with a `FILLED` acknowledgement built from the
/// submitted parameters, so happy-path tests only script the failures.
#[derive(Debug)]
pub struct MockTransport {
    submit_script: Mutex<VecDeque<TransportResult<serde_json::Value>>>,
    server_time_script: Mutex<VecDeque<TransportResult<u64>>>,
    /// Answer for `server_time` once its script is exhausted.
    server_time: AtomicU64,
    prices: Mutex<HashMap<String, Price>>,
    submits: Mutex<Vec<RecordedSubmit>>,
    server_time_calls: AtomicUsize,
    ticker_calls: AtomicUsize,
    next_order_id: AtomicI64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create a mock with an empty script and a server time of zero.
    pub fn new() -> Self {
        Self {
            submit_script: Mutex::new(VecDeque::new()),
            server_time_script: Mutex::new(VecDeque::new()),
            server_time: AtomicU64::new(0),
            prices: Mutex::new(HashMap::new()),
            submits: Mutex::new(Vec::new()),
            server_time_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            next_order_id: AtomicI64::new(1),
        }
    }

    /// Queue the next `submit` outcome.
    pub fn push_submit(&self, result: TransportResult<serde_json::Value>) {
        self.submit_script.lock().push_back(result);
    }

    /// Queue a submit failure.
    pub fn push_submit_error(&self, error: TransportError) {
        self.push_submit(Err(error));
    }

    /// Queue the next `server_time` outcome.
    pub fn push_server_time(&self, result: TransportResult<u64>) {
        self.server_time_script.lock().push_back(result);
    }

    /// Fixed server time returned once the script runs out.
    pub fn set_server_time(&self, server_time_ms: u64) {
        self.server_time.store(server_time_ms, Ordering::SeqCst);
    }

    pub fn set_price(&self, symbol: &str, price: Price) {
        self.prices.lock().insert(symbol.to_string(), price);
    }

    /// Recorded submits in call order.
    pub fn submits(&self) -> Vec<RecordedSubmit> {
        self.submits.lock().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submits.lock().len()
    }

    pub fn server_time_calls(&self) -> usize {
        self.server_time_calls.load(Ordering::SeqCst)
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    /// `FILLED` acknowledgement echoing the submitted parameters.
    pub fn filled_ack(&self, params: &QueryParams) -> serde_json::Value {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let symbol = params.get("symbol").unwrap_or_default();
        let quantity = params.get("quantity").unwrap_or("0");
        let avg_price = params
            .get("price")
            .map(str::to_string)
            .or_else(|| self.prices.lock().get(symbol).map(|p| p.to_wire()))
            .unwrap_or_else(|| "0".to_string());

        json!({
            "orderId": order_id,
            "symbol": symbol,
            "status": "FILLED",
            "clientOrderId": params.get("newClientOrderId").unwrap_or_default(),
            "avgPrice": avg_price,
            "origQty": quantity,
            "executedQty": quantity,
            "type": params.get("type").unwrap_or("MARKET"),
            "side": params.get("side").unwrap_or("BUY"),
            "reduceOnly": params.get("reduceOnly") == Some("true"),
        })
    }
}

impl ExchangeTransport for MockTransport {
    fn server_time(&self) -> BoxFuture<'_, TransportResult<u64>> {
        Box::pin(async move {
            self.server_time_calls.fetch_add(1, Ordering::SeqCst);
            match self.server_time_script.lock().pop_front() {
                Some(result) => result,
                None => Ok(self.server_time.load(Ordering::SeqCst)),
            }
        })
    }

    fn ticker_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, TransportResult<Price>> {
        Box::pin(async move {
            self.ticker_calls.fetch_add(1, Ordering::SeqCst);
            self.prices
                .lock()
                .get(symbol)
                .copied()
                .ok_or_else(|| TransportError::exchange(400, -1121, "Invalid symbol."))
        })
    }

    fn submit(&self, request: SignedRequest) -> BoxFuture<'_, TransportResult<serde_json::Value>> {
        Box::pin(async move {
            let recorded = RecordedSubmit {
                endpoint: request.endpoint().to_string(),
                params: request.params().clone(),
                timestamp: request.timestamp(),
                body: request.body(),
            };
            self.submits.lock().push(recorded);

            let scripted = self.submit_script.lock().pop_front();
            match scripted {
                Some(result) => result,
                None => Ok(self.filled_ack(request.params())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{Credentials, RequestSigner};
    use ordbot_core::{SystemClock, TimeOffset};
    use rust_decimal_macros::dec;

    fn signed(params: QueryParams) -> SignedRequest {
        let signer =
            RequestSigner::new(&Credentials::new("k", "s"), 5000, Arc::new(SystemClock)).unwrap();
        signer.sign("/fapi/v1/order", params, &TimeOffset::ZERO)
    }

    #[tokio::test]
    async fn test_mock_auto_fills_from_params() {
        let mock = MockTransport::new();
        mock.set_price("BTCUSDT", Price::new(dec!(30000)));

        let params = QueryParams::new()
            .with("symbol", "BTCUSDT")
            .with("side", "SELL")
            .with("type", "MARKET")
            .with("quantity", "0.002")
            .with("newClientOrderId", "abc");
        let body = mock.submit(signed(params)).await.unwrap();

        assert_eq!(body["status"], "FILLED");
        assert_eq!(body["executedQty"], "0.002");
        assert_eq!(body["avgPrice"], "30000");
        assert_eq!(body["clientOrderId"], "abc");
        assert_eq!(mock.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_replays_script_in_order() {
        let mock = MockTransport::new();
        mock.push_submit_error(TransportError::Timeout("slow".to_string()));

        let first = mock.submit(signed(QueryParams::new())).await;
        let second = mock.submit(signed(QueryParams::new())).await;

        assert_eq!(first, Err(TransportError::Timeout("slow".to_string())));
        assert!(second.is_ok());
        assert_eq!(mock.submits().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_server_time_script_then_fixed() {
        let mock = MockTransport::new();
        mock.set_server_time(42);
        mock.push_server_time(Err(TransportError::Connection("reset".to_string())));

        assert!(mock.server_time().await.is_err());
        assert_eq!(mock.server_time().await, Ok(42));
        assert_eq!(mock.server_time_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_symbol_is_rejected() {
        let mock = MockTransport::new();
        let err = mock.ticker_price("NOPE").await.unwrap_err();
        assert_eq!(err.exchange_code(), Some(-1121));
    }
}
