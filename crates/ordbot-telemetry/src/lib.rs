//! Structured logging for ordbot.
//!
//! Events go to stderr so that stdout stays free for the order result.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat, DEFAULT_FILTER};
