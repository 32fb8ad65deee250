//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor config sets one.
pub const DEFAULT_FILTER: &str = "info,ordbot=debug";

/// Output format of log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    /// JSON when `RUST_ENV=production`, pretty otherwise.
    pub fn from_env() -> Self {
        Self::for_environment(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn for_environment(rust_env: Option<&str>) -> Self {
        match rust_env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Build the event filter.
///
/// `RUST_LOG` wins; otherwise `configured` (from the config file) is used,
/// falling back to [`DEFAULT_FILTER`].
fn build_filter(configured: Option<&str>) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = configured.unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directives)
        .map_err(|e| TelemetryError::InvalidFilter(format!("{directives}: {e}")))
}

/// Initialize structured logging.
///
/// Configures tracing with JSON output for production and
/// pretty output for development. Writes to stderr.
///
/// # Errors
/// `InvalidFilter` for an unparseable `configured` filter, `LoggingInit` if
/// a global subscriber is already installed.
pub fn init_logging(configured: Option<&str>) -> TelemetryResult<()> {
    let env_filter = build_filter(configured)?;

    let result = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
