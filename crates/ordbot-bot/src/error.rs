//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Credentials error: {0}")]
    Credentials(#[from] ordbot_exchange::CredentialsError),

    #[error("Signer error: {0}")]
    Signer(#[from] ordbot_exchange::SignerError),

    #[error("Transport error: {0}")]
    Transport(#[from] ordbot_exchange::TransportError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] ordbot_telemetry::TelemetryError),

    #[error(transparent)]
    Order(#[from] ordbot_executor::OrderError),
}

pub type AppResult<T> = Result<T, AppError>;
