//! Executor error types.
//!
//! `OrderError` is what `ExecutionEngine::place_order` returns. It has three
//! families:
//! - `ValidationError`: local pre-flight failure, nothing was sent
//! - `TimeSyncError`: the exchange clock could not be measured
//! - `ExecutionError`: a submission failed for good

use ordbot_core::{ClientOrderId, Price, Size};
use ordbot_exchange::TransportError;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::retry::FailureKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Symbol must not be empty")]
    EmptySymbol,

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Size),

    #[error("Limit price must be positive, got {0}")]
    NonPositivePrice(Price),

    #[error("TWAP slice count must be between 1 and {max}, got {0}", max = ClientOrderId::MAX_SLICES)]
    InvalidSliceCount(u32),

    #[error("TWAP interval must be positive")]
    InvalidInterval,

    #[error("TWAP slice {index} would have quantity {quantity}")]
    EmptySlice { index: u32, quantity: Size },

    #[error("Notional {notional} is below the minimum of {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },
}

#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error("Exchange time unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Exchange time response unusable: {source}")]
    Malformed {
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Timestamp rejected after re-sync: {source}")]
    TimestampRejected {
        #[source]
        source: TransportError,
    },

    #[error("Rate limited after {attempts} attempt(s): {source}")]
    RateLimited {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Network failure after {attempts} attempt(s): {source}")]
    TransientNetwork {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Exchange rejected order (code={code:?}): {message}")]
    ExchangeRejected {
        code: Option<i64>,
        message: String,
        #[source]
        source: TransportError,
    },

    #[error("Malformed exchange response: {source}")]
    MalformedResponse {
        #[source]
        source: TransportError,
    },

    /// Shutdown requested while waiting to retry.
    #[error("Cancelled after {attempts} attempt(s), last error: {source}")]
    Cancelled {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl ExecutionError {
    /// Build the terminal error for a failure the retry policy gave up on.
    pub fn from_failure(kind: FailureKind, attempts: u32, source: TransportError) -> Self {
        match kind {
            FailureKind::Network | FailureKind::Server => Self::TransientNetwork { attempts, source },
            FailureKind::RateLimited { .. } => Self::RateLimited { attempts, source },
            FailureKind::TimestampRejected => Self::TimestampRejected { source },
            FailureKind::Malformed => Self::MalformedResponse { source },
            FailureKind::Rejected => {
                let (code, message) = match &source {
                    TransportError::Http { code, message, .. } => (*code, message.clone()),
                    other => (None, other.to_string()),
                };
                Self::ExchangeRejected {
                    code,
                    message,
                    source,
                }
            }
        }
    }

    /// Exchange error code behind this failure, if any.
    pub fn exchange_code(&self) -> Option<i64> {
        self.transport_error().exchange_code()
    }

    pub fn transport_error(&self) -> &TransportError {
        match self {
            Self::TimestampRejected { source }
            | Self::RateLimited { source, .. }
            | Self::TransientNetwork { source, .. }
            | Self::ExchangeRejected { source, .. }
            | Self::MalformedResponse { source }
            | Self::Cancelled { source, .. } => source,
        }
    }
}

/// Caller-facing error of `place_order`.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Clock sync failed: {0}")]
    TimeSync(#[from] TimeSyncError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

pub type EngineResult<T> = Result<T, OrderError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
