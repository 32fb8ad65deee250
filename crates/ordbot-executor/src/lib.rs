//! Order execution for ordbot.
//!
//! - `clock_sync`: exchange clock offset measurement
//! - `retry`: failure classification and backoff
//! - `validator`: pre-submission checks
//! - `twap`: slice planning and schedule state
//! - `engine`: `ExecutionEngine::place_order`

pub mod clock_sync;
pub mod engine;
pub mod error;
pub mod retry;
pub mod sleeper;
pub mod twap;
pub mod validator;

pub use clock_sync::{ClockSync, ClockSyncConfig, OffsetHandle};
pub use engine::{EngineConfig, ExecutionEngine};
pub use error::{
    EngineResult, ExecutionError, ExecutionResult, OrderError, TimeSyncError, ValidationError,
};
pub use retry::{FailureKind, RetryClass, RetryConfig, RetryDecision, RetryPolicy, RetryTracker};
pub use sleeper::{DynSleeper, RecordingSleeper, Sleeper, TokioSleeper};
pub use twap::{plan_slices, TwapRun, TwapSlice};
pub use validator::{NotionalGuard, OrderValidator, ValidationConfig};
