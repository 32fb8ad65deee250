//! Local-to-exchange clock offset measurement.
//!
//! # Offset Convention
//! `offset_ms = server_time - local_time`, where local time is the midpoint
//! of the request round trip:
//!
//! ```text
//! offset = server_time - (t0 + t1) / 2
//! ```
//!
//! A measurement whose round trip exceeds `max_round_trip_ms` is discarded
//! and taken once more; the second reading is accepted regardless.

use std::sync::Arc;

use ordbot_core::{Clock, TimeOffset};
use ordbot_exchange::{DynTransport, TransportError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::TimeSyncError;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::sleeper::DynSleeper;

/// Clock synchronization configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSyncConfig {
    #[serde(default = "default_max_round_trip_ms")]
    pub max_round_trip_ms: u64,
    /// Offsets larger than this (either sign) are logged at WARN.
    #[serde(default = "default_warn_drift_ms")]
    pub warn_drift_ms: u64,
    /// Fail orders when the initial sync fails instead of using a zero offset.
    #[serde(default)]
    pub strict: bool,
}

fn default_max_round_trip_ms() -> u64 {
    1000
}

fn default_warn_drift_ms() -> u64 {
    1000
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            max_round_trip_ms: default_max_round_trip_ms(),
            warn_drift_ms: default_warn_drift_ms(),
            strict: false,
        }
    }
}

/// Read-only view of the cached offset.
#[derive(Debug, Clone)]
pub struct OffsetHandle(Arc<RwLock<TimeOffset>>);

impl OffsetHandle {
    pub fn get(&self) -> TimeOffset {
        *self.0.read()
    }
}

/// Measures and caches the exchange clock offset.
pub struct ClockSync {
    transport: DynTransport,
    clock: Arc<dyn Clock>,
    sleeper: DynSleeper,
    policy: RetryPolicy,
    config: ClockSyncConfig,
    offset: Arc<RwLock<TimeOffset>>,
}

impl ClockSync {
    pub fn new(
        transport: DynTransport,
        clock: Arc<dyn Clock>,
        sleeper: DynSleeper,
        policy: RetryPolicy,
        config: ClockSyncConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            sleeper,
            policy,
            config,
            offset: Arc::new(RwLock::new(TimeOffset::ZERO)),
        }
    }

    pub fn config(&self) -> &ClockSyncConfig {
        &self.config
    }

    /// Cached offset (`TimeOffset::ZERO` until the first successful sync).
    pub fn offset(&self) -> TimeOffset {
        *self.offset.read()
    }

    pub fn handle(&self) -> OffsetHandle {
        OffsetHandle(Arc::clone(&self.offset))
    }

    /// Measure the offset and cache it.
    ///
    /// # Errors
    /// `TimeSyncError` if the time endpoint stays unreachable past the retry
    /// budget or answers with something unusable. The cached offset is left
    /// untouched on failure.
    pub async fn sync(&self) -> Result<TimeOffset, TimeSyncError> {
        let mut measured = self.measure_with_retry().await?;

        if let Some(rtt) = measured.round_trip_ms {
            if rtt > self.config.max_round_trip_ms {
                warn!(
                    round_trip_ms = rtt,
                    max_round_trip_ms = self.config.max_round_trip_ms,
                    "Clock sync round trip too slow, measuring again"
                );
                measured = self.measure_with_retry().await?;

                if let Some(rtt) = measured.round_trip_ms {
                    if rtt > self.config.max_round_trip_ms {
                        warn!(round_trip_ms = rtt, "Accepting slow clock sync measurement");
                    }
                }
            }
        }

        if measured.offset_ms.unsigned_abs() > self.config.warn_drift_ms {
            warn!(
                offset_ms = measured.offset_ms,
                threshold_ms = self.config.warn_drift_ms,
                "Large clock drift against exchange"
            );
        }

        *self.offset.write() = measured;
        info!(
            offset_ms = measured.offset_ms,
            round_trip_ms = ?measured.round_trip_ms,
            "Clock synchronized"
        );
        Ok(measured)
    }

    /// One measurement, retrying transport failures per the retry policy.
    async fn measure_with_retry(&self) -> Result<TimeOffset, TimeSyncError> {
        let mut tracker = self.policy.tracker();

        loop {
            match self.measure_once().await {
                Ok(offset) => return Ok(offset),
                Err(e) => match tracker.on_failure(&e) {
                    RetryDecision::Backoff(delay) => {
                        warn!(
                            error = %e,
                            attempt = tracker.attempts(),
                            delay_ms = delay.as_millis() as u64,
                            "Server time request failed, retrying"
                        );
                        self.sleeper.sleep(delay).await;
                    }
                    RetryDecision::Resync | RetryDecision::GiveUp(_) => {
                        return Err(match e {
                            TransportError::Malformed(_) => TimeSyncError::Malformed { source: e },
                            _ => TimeSyncError::Unreachable {
                                attempts: tracker.attempts(),
                                source: e,
                            },
                        });
                    }
                },
            }
        }
    }

    async fn measure_once(&self) -> Result<TimeOffset, TransportError> {
        let t0 = self.clock.now_ms();
        let server_time = self.transport.server_time().await?;
        let t1 = self.clock.now_ms();

        let round_trip = t1.saturating_sub(t0);
        let midpoint = t0 + round_trip / 2;
        let offset_ms = server_time as i64 - midpoint as i64;

        debug!(t0, t1, server_time, offset_ms, "Clock sync measurement");
        Ok(TimeOffset::measured(offset_ms, t1, round_trip))
    }
}

impl std::fmt::Debug for ClockSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockSync")
            .field("config", &self.config)
            .field("offset", &self.offset())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sleeper::RecordingSleeper;
    use mockall::mock;
    use mockall::Sequence;
    use ordbot_exchange::MockTransport;

    mock! {
        pub TestClock {}
        impl Clock for TestClock {
            fn now_ms(&self) -> u64;
        }
    }

    const BASE_TIME: u64 = 1_700_000_000_000;

    /// Clock that answers `readings` in order.
    fn clock_reading(readings: &[u64]) -> Arc<dyn Clock> {
        let mut clock = MockTestClock::new();
        let mut seq = Sequence::new();
        for &reading in readings {
            clock
                .expect_now_ms()
                .times(1)
                .in_sequence(&mut seq)
                .return_const(reading);
        }
        Arc::new(clock)
    }

    fn clock_sync(
        transport: Arc<MockTransport>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<RecordingSleeper>,
    ) -> ClockSync {
        ClockSync::new(
            transport,
            clock,
            sleeper,
            RetryPolicy::default(),
            ClockSyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_midpoint_offset() {
        let transport = Arc::new(MockTransport::new());
        // Server 500ms ahead of the round-trip midpoint
        transport.set_server_time(BASE_TIME + 50 + 500);
        let clock = clock_reading(&[BASE_TIME, BASE_TIME + 100]);
        let sync = clock_sync(transport, clock, Arc::new(RecordingSleeper::new()));

        let offset = sync.sync().await.unwrap();
        assert_eq!(offset.offset_ms, 500);
        assert_eq!(offset.round_trip_ms, Some(100));
        assert_eq!(sync.offset(), offset);
        assert_eq!(sync.handle().get(), offset);
    }

    #[tokio::test]
    async fn test_negative_offset_when_server_behind() {
        let transport = Arc::new(MockTransport::new());
        transport.set_server_time(BASE_TIME - 2000);
        let clock = clock_reading(&[BASE_TIME, BASE_TIME]);
        let sync = clock_sync(transport, clock, Arc::new(RecordingSleeper::new()));

        assert_eq!(sync.sync().await.unwrap().offset_ms, -2000);
    }

    #[tokio::test]
    async fn test_slow_round_trip_measured_once_more() {
        let transport = Arc::new(MockTransport::new());
        transport.set_server_time(BASE_TIME + 5000);
        // First round trip 3000ms (discarded), second 40ms
        let clock = clock_reading(&[BASE_TIME, BASE_TIME + 3000, BASE_TIME + 4000, BASE_TIME + 4040]);
        let sync = clock_sync(transport.clone(), clock, Arc::new(RecordingSleeper::new()));

        let offset = sync.sync().await.unwrap();
        assert_eq!(transport.server_time_calls(), 2);
        assert_eq!(offset.round_trip_ms, Some(40));
        assert_eq!(offset.offset_ms, 5000 - 4020);
    }

    #[tokio::test]
    async fn test_second_slow_measurement_is_accepted() {
        let transport = Arc::new(MockTransport::new());
        transport.set_server_time(BASE_TIME);
        let clock = clock_reading(&[BASE_TIME, BASE_TIME + 2000, BASE_TIME, BASE_TIME + 2000]);
        let sync = clock_sync(transport.clone(), clock, Arc::new(RecordingSleeper::new()));

        let offset = sync.sync().await.unwrap();
        assert_eq!(transport.server_time_calls(), 2);
        assert_eq!(offset.round_trip_ms, Some(2000));
    }

    #[tokio::test]
    async fn test_transient_failure_backs_off_then_succeeds() {
        let transport = Arc::new(MockTransport::new());
        transport.push_server_time(Err(TransportError::Timeout("slow".to_string())));
        transport.set_server_time(BASE_TIME);
        // The failed attempt reads the clock once before erroring
        let clock = clock_reading(&[BASE_TIME, BASE_TIME, BASE_TIME]);
        let sleeper = Arc::new(RecordingSleeper::new());
        let sync = clock_sync(transport.clone(), clock, sleeper.clone());

        tokio_test::assert_ok!(sync.sync().await);
        assert_eq!(sleeper.sleeps().len(), 1);
        assert_eq!(transport.server_time_calls(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_after_budget_keeps_previous_offset() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..3 {
            transport.push_server_time(Err(TransportError::Connection("refused".to_string())));
        }
        let clock = clock_reading(&[BASE_TIME, BASE_TIME, BASE_TIME]);
        let sync = clock_sync(transport.clone(), clock, Arc::new(RecordingSleeper::new()));

        let err = tokio_test::assert_err!(sync.sync().await);
        assert!(matches!(err, TimeSyncError::Unreachable { attempts: 3, .. }));
        assert_eq!(sync.offset(), TimeOffset::ZERO);
    }

    #[tokio::test]
    async fn test_malformed_time_fails_fast() {
        let transport = Arc::new(MockTransport::new());
        transport.push_server_time(Err(TransportError::Malformed("no serverTime".to_string())));
        let clock = clock_reading(&[BASE_TIME]);
        let sleeper = Arc::new(RecordingSleeper::new());
        let sync = clock_sync(transport.clone(), clock, sleeper.clone());

        let err = sync.sync().await.unwrap_err();
        assert!(matches!(err, TimeSyncError::Malformed { .. }));
        assert!(sleeper.sleeps().is_empty());
        assert_eq!(transport.server_time_calls(), 1);
    }
}
