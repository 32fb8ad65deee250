//! Request signing for the exchange's authenticated REST endpoints.
//!
//! Signing process:
//! 1. Append `recvWindow` and `timestamp` to the caller's parameters
//! 2. Serialize the parameters form-urlencoded, in insertion order
//! 3. HMAC-SHA256 the exact serialized string with the API secret
//! 4. Send `<serialized>&signature=<hex>` as the request body
//!
//! The serialized string is built once and stored in the [`SignedRequest`];
//! the transport sends those bytes verbatim, so nothing downstream can
//! reorder or re-encode what was signed.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hmac::{Hmac, Mac};
use ordbot_core::{Clock, TimeOffset};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Credentials
// =============================================================================

/// API key and secret.
///
/// Security notes:
/// - The secret lives in zeroize-on-drop memory.
/// - `Debug` never prints the secret, and the key only partially.
/// - Credentials are loaded once at startup; no runtime rotation.
pub struct Credentials {
    api_key: String,
    api_secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: Zeroizing::new(api_secret.into()),
        }
    }

    /// Load from environment variables.
    ///
    /// # Errors
    /// Returns `CredentialsError` if either variable is missing or blank.
    pub fn from_env(key_var: &str, secret_var: &str) -> Result<Self, CredentialsError> {
        let read = |var: &str| -> Result<String, CredentialsError> {
            let value =
                std::env::var(var).map_err(|_| CredentialsError::EnvVarNotFound(var.to_string()))?;
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(CredentialsError::Empty(var.to_string()));
            }
            Ok(trimmed.to_string())
        };

        let api_key = read(key_var)?;
        let api_secret = Zeroizing::new(read(secret_var)?);
        Ok(Self {
            api_key,
            api_secret,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn secret_bytes(&self) -> &[u8] {
        self.api_secret.as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self.api_key.chars().take(4).collect();
        f.debug_struct("Credentials")
            .field("api_key", &format!("{visible}…"))
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Credential loading errors.
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Environment variable is empty: {0}")]
    Empty(String),
}

/// Signer construction errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

// =============================================================================
// QueryParams
// =============================================================================

/// Ordered request parameters.
///
/// Insertion order is preserved through serialization; the signature is
/// only reproducible if the exchange sees the same order we signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Builder-style append.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Form-urlencoded serialization in insertion order.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.0 {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

// =============================================================================
// SignedRequest
// =============================================================================

/// Authenticated, timestamped request ready for the transport.
///
/// Immutable and single-use: it is not `Clone`, and the transport takes it
/// by value. Retries build a new one with a fresh timestamp.
#[derive(Debug)]
pub struct SignedRequest {
    endpoint: String,
    params: QueryParams,
    timestamp: u64,
    payload: String,
    signature: String,
}

impl SignedRequest {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Parameters as signed, including `recvWindow` and `timestamp`.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Exchange-adjusted timestamp (ms).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The exact string the signature covers.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Wire body: the signed payload followed by the signature.
    pub fn body(&self) -> String {
        format!("{}&signature={}", self.payload, self.signature)
    }
}

// =============================================================================
// RequestSigner
// =============================================================================

/// Builds [`SignedRequest`]s with strictly increasing timestamps.
///
/// # Timestamp guarantees
/// `timestamp = max(previous + 1, local_time + offset)`, so successive
/// requests from one signer never share or regress a timestamp, even when
/// the local clock steps backwards or a re-sync lowers the offset.
pub struct RequestSigner {
    mac: HmacSha256,
    recv_window_ms: u64,
    clock: Arc<dyn Clock>,
    /// Last issued timestamp (monotonic high-water mark).
    last_timestamp: AtomicU64,
}

impl RequestSigner {
    /// Default `recvWindow` in milliseconds.
    pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

    /// Create a signer from credentials.
    ///
    /// # Errors
    /// Returns `SignerError::InvalidKey` if the MAC cannot be keyed.
    pub fn new(
        credentials: &Credentials,
        recv_window_ms: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SignerError> {
        let mac = HmacSha256::new_from_slice(credentials.secret_bytes())
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        Ok(Self {
            mac,
            recv_window_ms,
            clock,
            last_timestamp: AtomicU64::new(0),
        })
    }

    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }

    /// Sign `params` for `endpoint` using the given clock offset.
    pub fn sign(&self, endpoint: &str, params: QueryParams, offset: &TimeOffset) -> SignedRequest {
        let timestamp = self.next_timestamp(offset.apply(self.clock.now_ms()));

        let mut params = params;
        params
            .push("recvWindow", self.recv_window_ms.to_string())
            .push("timestamp", timestamp.to_string());

        let payload = params.encode();
        let signature = self.signature_hex(&payload);

        SignedRequest {
            endpoint: endpoint.to_string(),
            params,
            timestamp,
            payload,
            signature,
        }
    }

    /// Lowercase hex HMAC-SHA256 of `payload`.
    pub fn signature_hex(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Last timestamp issued (0 before the first request).
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp.load(Ordering::Acquire)
    }

    /// Returns `max(last + 1, target)` and records it. CAS loop so a shared
    /// signer still never issues a duplicate.
    fn next_timestamp(&self, target: u64) -> u64 {
        loop {
            let current = self.last_timestamp.load(Ordering::Acquire);
            let next_val = if target > current {
                target
            } else {
                current.saturating_add(1)
            };

            match self.last_timestamp.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSigner")
            .field("recv_window_ms", &self.recv_window_ms)
            .field("last_timestamp", &self.last_timestamp())
            .finish_non_exhaustive()
    }
}
