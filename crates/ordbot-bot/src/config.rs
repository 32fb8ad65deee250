//! Application configuration.

use std::path::Path;
use std::time::Duration;

use ordbot_executor::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable overriding the config path.
pub const CONFIG_ENV_VAR: &str = "ORDBOT_CONFIG";

/// Exchange endpoint and credential sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Environment variable holding the API secret.
    #[serde(default = "default_api_secret_env")]
    pub api_secret_env: String,
}

fn default_base_url() -> String {
    ordbot_exchange::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    ordbot_exchange::DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_api_secret_env() -> String {
    "API_SECRET".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            api_key_env: default_api_key_env(),
            api_secret_env: default_api_secret_env(),
        }
    }
}

impl ExchangeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter directives; `RUST_LOG` takes precedence.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Resolve the config path (CLI arg > `ORDBOT_CONFIG` > default) and load it.
    ///
    /// A missing file at the default location yields the built-in defaults;
    /// an explicitly requested file must exist.
    pub fn load(cli_path: Option<&str>) -> AppResult<(Self, String)> {
        let explicit = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok());

        match explicit {
            Some(path) => Ok((Self::from_file(&path)?, path)),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Ok((Self::from_file(DEFAULT_CONFIG_PATH)?, DEFAULT_CONFIG_PATH.to_string()))
            }
            None => Ok((Self::default(), "<built-in defaults>".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordbot_core::Size;
    use ordbot_executor::NotionalGuard;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.exchange.base_url, "https://testnet.binancefuture.com");
        assert_eq!(config.exchange.api_key_env, "API_KEY");
        assert_eq!(config.engine.retry.max_attempts, 3);
        assert_eq!(config.engine.validation.min_notional, dec!(100));
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [exchange]
            request_timeout_ms = 2500

            [engine]
            recv_window_ms = 10000
            quantity_step = "0.01"

            [engine.retry]
            max_attempts = 5

            [engine.validation]
            notional_guard = "adjust"
            min_notional = "5"

            [engine.clock_sync]
            strict = true

            [telemetry]
            log_level = "warn,ordbot=info"
            "#,
        )
        .unwrap();

        assert_eq!(config.exchange.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.exchange.base_url, default_base_url());
        assert_eq!(config.engine.recv_window_ms, 10_000);
        assert_eq!(config.engine.quantity_step, Size::new(dec!(0.01)));
        assert_eq!(config.engine.retry.max_attempts, 5);
        assert_eq!(config.engine.retry.initial_backoff_ms, 1000);
        assert_eq!(config.engine.validation.notional_guard, NotionalGuard::Adjust);
        assert_eq!(config.engine.validation.min_notional, dec!(5));
        assert!(config.engine.clock_sync.strict);
        assert_eq!(config.engine.clock_sync.max_round_trip_ms, 1000);
        assert_eq!(config.telemetry.log_level.as_deref(), Some("warn,ordbot=info"));
    }

    #[test]
    fn test_unknown_guard_rejected() {
        let err = AppConfig::from_toml("[engine.validation]\nnotional_guard = \"sometimes\"")
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = AppConfig::from_file("/nonexistent/ordbot.toml").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let content = include_str!("../../../config/default.toml");
        let config = AppConfig::from_toml(content).unwrap();
        assert_eq!(config.engine.validation.notional_guard, NotionalGuard::Enforce);
    }
}
