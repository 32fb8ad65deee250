//! Application wiring: REST client, engine and shutdown signal.

use std::sync::Arc;

use ordbot_core::{ExecutionOutcome, OrderRequest};
use ordbot_exchange::{Credentials, DynTransport, FuturesRestClient};
use ordbot_executor::{ExecutionEngine, OrderError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;

/// One-shot order placement.
pub struct Application {
    engine: ExecutionEngine,
}

impl Application {
    /// Build the REST client and engine.
    pub fn new(config: &AppConfig, credentials: &Credentials) -> AppResult<Self> {
        let transport: DynTransport = Arc::new(FuturesRestClient::new(
            &config.exchange.base_url,
            credentials.api_key(),
            config.exchange.request_timeout(),
        )?);
        Self::with_transport(config, credentials, transport)
    }

    /// Build against an arbitrary transport.
    pub fn with_transport(
        config: &AppConfig,
        credentials: &Credentials,
        transport: DynTransport,
    ) -> AppResult<Self> {
        let engine = ExecutionEngine::new(transport, credentials, config.engine.clone())?;
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Sync the clock, place `request` and return the outcome.
    ///
    /// Ctrl-C stops at the next wait: a TWAP between slices returns its
    /// partial result, a retry backoff fails with `ExecutionError::Cancelled`.
    /// A request already on the wire is always awaited.
    pub async fn run(&self, request: OrderRequest) -> AppResult<ExecutionOutcome> {
        self.engine.start().await.map_err(OrderError::from)?;

        let watcher = spawn_ctrl_c_watcher(self.engine.cancel_token());
        let outcome = self.engine.place_order(request).await;
        watcher.abort();

        let outcome = outcome?;
        info!(status = %outcome.status(), "Finished");
        Ok(outcome)
    }
}

/// Cancel `token` on Ctrl-C.
fn spawn_ctrl_c_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    })
}
