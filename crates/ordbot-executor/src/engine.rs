//! Order execution engine.
//!
//! Orchestrates validation, clock sync, signing and retries for the three
//! strategies:
//!
//! - MARKET / LIMIT: Submit → AwaitResponse → Terminal(OrderResult)
//! - TWAP: (Submit slice → AwaitResponse → Wait)* → Aggregate → Terminal(TwapResult)
//!
//! # Pre-flight Order
//!
//! 1. Shape checks (no network)
//! 2. Reference price lookup (MARKET/TWAP only, failure is non-fatal)
//! 3. Quantity adjustment (`NotionalGuard::Adjust` only)
//! 4. Notional check
//! 5. Initial clock sync (first order only)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ordbot_core::{
    ClientOrderId, Clock, ExecutionOutcome, OrderRequest, OrderResult, OrderType, Price, Size,
    Strategy, SystemClock, TimeOffset, TwapResult,
};
use ordbot_exchange::{
    Credentials, DynTransport, OrderAck, QueryParams, RequestSigner, SignerError, ORDER_ENDPOINT,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::clock_sync::{ClockSync, ClockSyncConfig, OffsetHandle};
use crate::error::{EngineResult, ExecutionError, ExecutionResult, TimeSyncError};
use crate::retry::{RetryConfig, RetryDecision, RetryPolicy};
use crate::sleeper::{DynSleeper, TokioSleeper};
use crate::twap::{plan_slices, TwapRun};
use crate::validator::{OrderValidator, ValidationConfig};

// ============================================================================
// EngineConfig
// ============================================================================

/// Execution engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `recvWindow` sent with every signed request.
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// Quantity increment for TWAP slices and notional adjustment.
    /// Zero disables stepping (8 decimal places instead).
    #[serde(default = "default_quantity_step")]
    pub quantity_step: Size,
    #[serde(default)]
    pub clock_sync: ClockSyncConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_recv_window_ms() -> u64 {
    RequestSigner::DEFAULT_RECV_WINDOW_MS
}

fn default_quantity_step() -> Size {
    Size::new(rust_decimal::Decimal::new(1, 3))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recv_window_ms: default_recv_window_ms(),
            quantity_step: default_quantity_step(),
            clock_sync: ClockSyncConfig::default(),
            retry: RetryConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configured step, `None` when stepping is disabled.
    pub fn effective_quantity_step(&self) -> Option<Size> {
        Some(self.quantity_step).filter(|s| s.is_positive())
    }
}

// ============================================================================
// ExecutionEngine
// ============================================================================

/// Places orders one at a time against a single exchange transport.
pub struct ExecutionEngine {
    transport: DynTransport,
    signer: RequestSigner,
    clock_sync: ClockSync,
    /// Offset applied to every signed timestamp; follows each (re)sync.
    offset: OffsetHandle,
    retry: RetryPolicy,
    validator: OrderValidator,
    sleeper: DynSleeper,
    cancel: CancellationToken,
    quantity_step: Option<Size>,
    strict_sync: bool,
    /// Set once the initial sync has succeeded, or failed in non-strict mode.
    sync_attempted: AtomicBool,
}

impl ExecutionEngine {
    /// Create an engine using the system clock and tokio timer.
    ///
    /// # Errors
    /// `SignerError` if the credentials cannot key the signer.
    pub fn new(
        transport: DynTransport,
        credentials: &Credentials,
        config: EngineConfig,
    ) -> Result<Self, SignerError> {
        Self::with_components(
            transport,
            credentials,
            config,
            Arc::new(SystemClock),
            Arc::new(TokioSleeper),
        )
    }

    /// Create an engine with an explicit clock and sleeper.
    pub fn with_components(
        transport: DynTransport,
        credentials: &Credentials,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        sleeper: DynSleeper,
    ) -> Result<Self, SignerError> {
        let signer = RequestSigner::new(credentials, config.recv_window_ms, Arc::clone(&clock))?;
        let retry = RetryPolicy::new(config.retry.clone());
        let clock_sync = ClockSync::new(
            Arc::clone(&transport),
            clock,
            Arc::clone(&sleeper),
            retry.clone(),
            config.clock_sync.clone(),
        );
        let offset = clock_sync.handle();
        let quantity_step = config.effective_quantity_step();
        let validator = OrderValidator::new(config.validation.clone(), quantity_step);

        Ok(Self {
            transport,
            signer,
            clock_sync,
            offset,
            retry,
            validator,
            sleeper,
            cancel: CancellationToken::new(),
            quantity_step,
            strict_sync: config.clock_sync.strict,
            sync_attempted: AtomicBool::new(false),
        })
    }

    /// Use `token` to interrupt TWAP waits and retry backoff.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that interrupts TWAP waits and retry backoff when cancelled.
    ///
    /// In-flight requests are never abandoned; cancellation takes effect at
    /// the next wait.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn clock_sync(&self) -> &ClockSync {
        &self.clock_sync
    }

    /// Initial clock synchronization.
    ///
    /// Non-strict mode logs a failure and continues with the zero offset.
    pub async fn start(&self) -> Result<TimeOffset, TimeSyncError> {
        match self.clock_sync.sync().await {
            Ok(offset) => {
                self.sync_attempted.store(true, Ordering::SeqCst);
                Ok(offset)
            }
            Err(e) if !self.strict_sync => {
                self.sync_attempted.store(true, Ordering::SeqCst);
                warn!(error = %e, "Clock sync failed, continuing with unsynchronized offset");
                Ok(self.clock_sync.offset())
            }
            // Strict mode retries the sync on the next order
            Err(e) => Err(e),
        }
    }

    /// Validate and execute one order.
    ///
    /// TWAP runs return `Ok` even when a slice fails fatally or the run is
    /// cancelled; the `TwapResult` carries the interruption.
    ///
    /// # Errors
    /// - `OrderError::Validation` before anything is sent
    /// - `OrderError::TimeSync` in strict mode if the initial sync fails
    /// - `OrderError::Execution` for MARKET/LIMIT submission failures
    pub async fn place_order(&self, request: OrderRequest) -> EngineResult<ExecutionOutcome> {
        let order_type = request.order_type();
        info!(
            symbol = %request.symbol,
            side = %request.side,
            order_type = %order_type,
            quantity = %request.quantity,
            price = ?request.price().map(|p| p.to_string()),
            reduce_only = request.reduce_only,
            "Placing order"
        );

        self.validator.check_shape(&request)?;

        let reference_price = if self.validator.needs_reference_price(&request) {
            self.reference_price(&request.symbol).await
        } else {
            None
        };
        let request = self.validator.adjust_quantity(request, reference_price);
        self.validator.check_notional(&request, reference_price)?;

        if !self.sync_attempted.load(Ordering::SeqCst) {
            self.start().await?;
        }

        let outcome = match request.strategy {
            Strategy::Market | Strategy::Limit { .. } => {
                let result = self.execute_single(&request).await.map_err(|e| {
                    error!(symbol = %request.symbol, error = %e, "Order failed");
                    e
                })?;
                ExecutionOutcome::Single(result)
            }
            Strategy::Twap { slices, interval } => {
                ExecutionOutcome::Twap(self.execute_twap(&request, slices, interval).await)
            }
        };

        info!(
            symbol = %request.symbol,
            status = %outcome.status(),
            executed = %outcome.executed_quantity(),
            "Order complete"
        );
        Ok(outcome)
    }

    async fn reference_price(&self, symbol: &str) -> Option<Price> {
        match self.transport.ticker_price(symbol).await {
            Ok(price) => {
                debug!(symbol, price = %price, "Reference price");
                Some(price)
            }
            Err(e) => {
                warn!(symbol, error = %e, "Reference price unavailable");
                None
            }
        }
    }

    async fn execute_single(&self, request: &OrderRequest) -> ExecutionResult<OrderResult> {
        let cloid = ClientOrderId::new();
        let params = order_params(request, request.quantity, OrderType::Market, &cloid);
        self.submit_with_retry(params, request.order_type()).await
    }

    async fn execute_twap(
        &self,
        request: &OrderRequest,
        slices: u32,
        interval: Duration,
    ) -> TwapResult {
        let plan = plan_slices(request.quantity, slices, self.quantity_step);
        let mut run = TwapRun::new(ClientOrderId::new(), plan);

        while let Some(slice) = run.next_slice() {
            if run.needs_wait() {
                debug!(next_slice = slice.index, interval_ms = interval.as_millis() as u64, "TWAP waiting");
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        warn!(
                            submitted = run.submitted(),
                            planned = run.planned(),
                            "TWAP cancelled, stopping schedule"
                        );
                        run.cancel();
                        break;
                    }
                    _ = self.sleeper.sleep(interval) => {}
                }
            }

            let params = order_params(request, slice.quantity, OrderType::Market, &slice.client_order_id);
            match self.submit_with_retry(params, OrderType::Market).await {
                Ok(result) => {
                    info!(
                        slice = slice.index,
                        of = run.planned(),
                        status = %result.status,
                        executed = %result.executed_quantity,
                        "TWAP slice done"
                    );
                    run.record(result);
                }
                Err(e) => {
                    let cancelled = matches!(e, ExecutionError::Cancelled { .. });
                    if cancelled {
                        warn!(slice = slice.index, error = %e, "TWAP slice retry cancelled, stopping schedule");
                    } else {
                        error!(slice = slice.index, error = %e, "TWAP slice failed, aborting schedule");
                    }
                    run.record(OrderResult::errored(
                        slice.client_order_id,
                        request.symbol.clone(),
                        request.side,
                        OrderType::Market,
                        slice.quantity,
                        e.to_string(),
                    ));
                    if cancelled {
                        run.cancel();
                    } else {
                        run.abort(e.to_string());
                    }
                }
            }
        }

        run.finish(request.symbol.clone(), request.side, request.quantity)
    }

    /// Sign and submit, re-signing on every retry.
    async fn submit_with_retry(
        &self,
        params: QueryParams,
        order_type: OrderType,
    ) -> ExecutionResult<OrderResult> {
        let mut tracker = self.retry.tracker();

        loop {
            let request = self
                .signer
                .sign(ORDER_ENDPOINT, params.clone(), &self.offset.get());
            debug!(
                attempt = tracker.attempts(),
                payload = request.payload(),
                "Submitting order"
            );

            let error = match self.transport.submit(request).await {
                Ok(raw) => {
                    let ack = OrderAck::from_value(&raw)
                        .map_err(|source| ExecutionError::MalformedResponse { source })?;
                    return Ok(ack.into_order_result(order_type, raw));
                }
                Err(e) => e,
            };

            match tracker.on_failure(&error) {
                RetryDecision::Backoff(delay) => {
                    warn!(
                        error = %error,
                        attempt = tracker.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Order submission failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            warn!(attempt = tracker.attempts(), "Retry cancelled by shutdown request");
                            return Err(ExecutionError::Cancelled {
                                attempts: tracker.attempts(),
                                source: error,
                            });
                        }
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
                RetryDecision::Resync => {
                    warn!(error = %error, "Timestamp rejected, re-synchronizing clock");
                    if let Err(sync_err) = self.clock_sync.sync().await {
                        warn!(error = %sync_err, "Re-sync failed");
                        return Err(ExecutionError::TimestampRejected { source: error });
                    }
                }
                RetryDecision::GiveUp(kind) => {
                    return Err(ExecutionError::from_failure(kind, tracker.attempts(), error));
                }
            }
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("signer", &self.signer)
            .field("clock_sync", &self.clock_sync)
            .field("quantity_step", &self.quantity_step)
            .finish_non_exhaustive()
    }
}

/// Order parameters in wire order.
///
/// `type` follows the strategy: LIMIT for limit orders, MARKET for market
/// orders and TWAP slices. `default_type` is used for the latter.
fn order_params(
    request: &OrderRequest,
    quantity: Size,
    default_type: OrderType,
    cloid: &ClientOrderId,
) -> QueryParams {
    let mut params = QueryParams::new();
    params
        .push("symbol", request.symbol.as_str())
        .push("side", request.side.as_str());

    match request.strategy {
        Strategy::Limit {
            price,
            time_in_force,
        } => {
            params
                .push("type", OrderType::Limit.as_str())
                .push("timeInForce", time_in_force.as_str())
                .push("quantity", quantity.to_wire())
                .push("price", price.to_wire());
        }
        Strategy::Market | Strategy::Twap { .. } => {
            params
                .push("type", default_type.as_str())
                .push("quantity", quantity.to_wire());
        }
    }

    if request.reduce_only {
        params.push("reduceOnly", "true");
    }
    params
        .push("newClientOrderId", cloid.as_str())
        .push("newOrderRespType", "RESULT");
    params
}
