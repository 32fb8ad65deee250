//! Wall-clock abstraction.

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Pre-epoch system time clamps to zero rather than wrapping
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Measured offset between the local clock and the exchange clock.
///
/// Offset convention: `offset_ms = server_time - local_time`
/// - Positive: server clock is ahead of local
/// - Negative: server clock is behind local
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOffset {
    pub offset_ms: i64,
    /// Local time (ms) of the measurement; `None` if never synchronized.
    pub measured_at_ms: Option<u64>,
    /// Round trip of the accepted measurement.
    pub round_trip_ms: Option<u64>,
}

impl TimeOffset {
    /// Unsynchronized offset. Usable, but requests may be rejected on drift.
    pub const ZERO: Self = Self {
        offset_ms: 0,
        measured_at_ms: None,
        round_trip_ms: None,
    };

    pub fn measured(offset_ms: i64, measured_at_ms: u64, round_trip_ms: u64) -> Self {
        Self {
            offset_ms,
            measured_at_ms: Some(measured_at_ms),
            round_trip_ms: Some(round_trip_ms),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.measured_at_ms.is_some()
    }

    /// Apply the offset to a local timestamp.
    pub fn apply(&self, local_ms: u64) -> u64 {
        if self.offset_ms >= 0 {
            local_ms.saturating_add(self.offset_ms as u64)
        } else {
            local_ms.saturating_sub(self.offset_ms.unsigned_abs())
        }
    }
}
