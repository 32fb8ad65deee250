//! ordbot: places MARKET, LIMIT and TWAP orders on a futures REST API.
//!
//! Main application that wires the components together:
//! - Command-line parsing into an `OrderRequest`
//! - TOML configuration with built-in defaults
//! - REST transport and execution engine
//! - Ctrl-C handling for TWAP schedules

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::Application;
pub use cli::Args;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
