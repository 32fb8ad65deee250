//! ordbot - Entry Point
//!
//! Places one order and prints the result as JSON on stdout.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ordbot_core::OrderStatus;
use ordbot_exchange::Credentials;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present; real environment variables win
    let dotenv_path = dotenvy::dotenv().ok();

    let args = ordbot_bot::Args::parse();

    // Determine config path: CLI arg > ORDBOT_CONFIG env var > default
    let (config, config_source) = ordbot_bot::AppConfig::load(args.config.as_deref())?;

    ordbot_telemetry::init_logging(config.telemetry.log_level.as_deref())?;

    info!("Starting ordbot v{}", env!("CARGO_PKG_VERSION"));
    info!(config = %config_source, dotenv = ?dotenv_path, base_url = %config.exchange.base_url, "Configuration loaded");

    let request = args.to_order_request()?;

    let credentials = Credentials::from_env(&config.exchange.api_key_env, &config.exchange.api_secret_env)
        .context("API credentials are required")?;

    let app = ordbot_bot::Application::new(&config, &credentials)?;

    let outcome = match app.run(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Order failed");
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(match outcome.status() {
        OrderStatus::Error => ExitCode::from(2),
        _ => ExitCode::SUCCESS,
    })
}
