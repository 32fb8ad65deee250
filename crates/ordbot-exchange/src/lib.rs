//! Exchange connectivity for ordbot.
//!
//! - `signer`: credentials, ordered parameters and HMAC request signing
//! - `transport`: the `ExchangeTransport` seam and a scripted mock
//! - `rest`: reqwest-backed futures REST client
//! - `wire`: response payloads

pub mod error;
pub mod rest;
pub mod signer;
pub mod transport;
pub mod wire;

pub use error::{TransportError, TransportResult};
pub use rest::{
    FuturesRestClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, ORDER_ENDPOINT, TICKER_PRICE_ENDPOINT,
    TIME_ENDPOINT,
};
pub use signer::{
    Credentials, CredentialsError, QueryParams, RequestSigner, SignedRequest, SignerError,
};
pub use transport::{BoxFuture, DynTransport, ExchangeTransport, MockTransport, RecordedSubmit};
pub use wire::{ExchangeErrorBody, OrderAck, ServerTimeResponse, TickerPriceResponse};
