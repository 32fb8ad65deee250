//! HTTP client for the futures REST API.

use std::time::Duration;

use ordbot_core::Price;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, trace};
use url::Url;

use crate::error::{TransportError, TransportResult};
use crate::signer::SignedRequest;
use crate::transport::{BoxFuture, ExchangeTransport};
use crate::wire::{ExchangeErrorBody, ServerTimeResponse, TickerPriceResponse};

/// Futures testnet.
pub const DEFAULT_BASE_URL: &str = "https://testnet.binancefuture.com";

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const ORDER_ENDPOINT: &str = "/fapi/v1/order";
pub const TIME_ENDPOINT: &str = "/fapi/v1/time";
pub const TICKER_PRICE_ENDPOINT: &str = "/fapi/v1/ticker/price";

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// REST client implementing [`ExchangeTransport`].
///
/// The API key travels as a header; the secret never reaches this type.
pub struct FuturesRestClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl FuturesRestClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g., "https://testnet.binancefuture.com")
    /// * `api_key` - sent as `X-MBX-APIKEY` on signed requests
    /// * `timeout` - per-request timeout
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TransportError::Connection(format!("Invalid base URL {base_url}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> TransportResult<Url> {
        self.base_url
            .join(endpoint)
            .map_err(|e| TransportError::Connection(format!("Invalid endpoint {endpoint}: {e}")))
    }

    async fn get_json(&self, url: Url) -> TransportResult<serde_json::Value> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        read_response(response).await
    }
}

impl ExchangeTransport for FuturesRestClient {
    fn server_time(&self) -> BoxFuture<'_, TransportResult<u64>> {
        Box::pin(async move {
            let body = self.get_json(self.url(TIME_ENDPOINT)?).await?;
            let parsed: ServerTimeResponse = serde_json::from_value(body)
                .map_err(|e| TransportError::Malformed(format!("server time: {e}")))?;
            Ok(parsed.server_time)
        })
    }

    fn ticker_price<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, TransportResult<Price>> {
        Box::pin(async move {
            let mut url = self.url(TICKER_PRICE_ENDPOINT)?;
            url.query_pairs_mut().append_pair("symbol", symbol);

            let body = self.get_json(url).await?;
            let parsed: TickerPriceResponse = serde_json::from_value(body)
                .map_err(|e| TransportError::Malformed(format!("ticker price: {e}")))?;
            Ok(parsed.price)
        })
    }

    fn submit(&self, request: SignedRequest) -> BoxFuture<'_, TransportResult<serde_json::Value>> {
        Box::pin(async move {
            let url = self.url(request.endpoint())?;
            debug!(
                endpoint = request.endpoint(),
                timestamp = request.timestamp(),
                "Submitting signed request"
            );

            let response = self
                .client
                .post(url)
                .header(API_KEY_HEADER, &self.api_key)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(request.body())
                .send()
                .await
                .map_err(map_reqwest_error)?;

            read_response(response).await
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_decode() {
        TransportError::Malformed(e.to_string())
    } else {
        TransportError::Connection(format!("HTTP request failed: {e}"))
    }
}

async fn read_response(response: reqwest::Response) -> TransportResult<serde_json::Value> {
    let status = response.status();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.map_err(map_reqwest_error)?;
    trace!(status = status.as_u16(), body = %body, "Exchange response");
    decode_body(status, retry_after, &body)
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Turn a status and body into the transport outcome.
///
/// Non-2xx bodies are decoded as `{code, msg}` when possible. A 2xx body
/// carrying a negative `code` is treated as an exchange error as well.
fn decode_body(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> TransportResult<serde_json::Value> {
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(body);

    if status.is_success() {
        let value = parsed.map_err(|e| TransportError::Malformed(format!("invalid JSON: {e}")))?;
        if let Ok(err) = serde_json::from_value::<ExchangeErrorBody>(value.clone()) {
            if err.code < 0 {
                return Err(TransportError::Http {
                    status: status.as_u16(),
                    code: Some(err.code),
                    message: err.msg,
                    retry_after,
                });
            }
        }
        return Ok(value);
    }

    let (code, message) = match parsed
        .ok()
        .and_then(|v| serde_json::from_value::<ExchangeErrorBody>(v).ok())
    {
        Some(err) => (Some(err.code), err.msg),
        None => (None, body.chars().take(256).collect()),
    };

    Err(TransportError::Http {
        status: status.as_u16(),
        code,
        message,
        retry_after,
    })
}
