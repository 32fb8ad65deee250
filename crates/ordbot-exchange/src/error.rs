//! Transport error types.

use std::time::Duration;

use thiserror::Error;

/// Failure reported by the exchange transport.
///
/// Carries enough structure (HTTP status, exchange error code, wait hint)
/// for the retry policy to classify it without string matching.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP {status}: code={code:?} {message}")]
    Http {
        status: u16,
        /// Exchange error code from the `{code, msg}` body, if present.
        code: Option<i64>,
        message: String,
        /// Server-supplied wait hint (`Retry-After`).
        retry_after: Option<Duration>,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Exchange-level error carrying a `{code, msg}` body.
    pub fn exchange(status: u16, code: i64, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            code: Some(code),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Exchange error code, if the failure carried one.
    pub fn exchange_code(&self) -> Option<i64> {
        match self {
            Self::Http { code, .. } => *code,
            _ => None,
        }
    }

    /// HTTP status, if the exchange answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
