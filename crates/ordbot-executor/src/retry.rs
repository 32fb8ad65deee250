//! Failure classification and retry decisions.
//!
//! | Failure                                   | Kind                | Retried |
//! |-------------------------------------------|---------------------|---------|
//! | timeout / connection reset                | `Network`           | backoff |
//! | HTTP 5xx, 408, codes -1000/-1001/-1007    | `Server`            | backoff |
//! | HTTP 429/418, codes -1003/-1015           | `RateLimited`       | wait hint, else backoff |
//! | codes -1021/-1022                         | `TimestampRejected` | once, after re-sync |
//! | any other HTTP 4xx                        | `Rejected`          | never |
//! | unparseable response                      | `Malformed`         | never |

use std::time::Duration;

use ordbot_exchange::TransportError;
use serde::{Deserialize, Serialize};

/// Timestamp outside recvWindow.
const CODE_TIMESTAMP_OUTSIDE_WINDOW: i64 = -1021;
/// Signature not valid (stale timestamp inside the signed payload).
const CODE_INVALID_SIGNATURE: i64 = -1022;
const CODE_TOO_MANY_REQUESTS: i64 = -1003;
const CODE_TOO_MANY_ORDERS: i64 = -1015;
const CODE_UNKNOWN: i64 = -1000;
const CODE_DISCONNECTED: i64 = -1001;
const CODE_BACKEND_TIMEOUT: i64 = -1007;

// ============================================================================
// Configuration
// ============================================================================

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, counting the first submission.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on a server-supplied rate-limit wait.
    #[serde(default = "default_max_rate_limit_wait_ms")]
    pub max_rate_limit_wait_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_rate_limit_wait_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
            max_rate_limit_wait_ms: default_max_rate_limit_wait_ms(),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Whether a failure may be resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Fatal,
}

/// What went wrong, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout or connection failure before an answer arrived.
    Network,
    /// Exchange-side transient failure.
    Server,
    RateLimited { retry_after: Option<Duration> },
    /// Timestamp or signature refused; the clock offset is suspect.
    TimestampRejected,
    /// Business rejection (bad symbol, margin, notional, ...).
    Rejected,
    Malformed,
}

impl FailureKind {
    pub fn class(&self) -> RetryClass {
        match self {
            Self::Rejected | Self::Malformed => RetryClass::Fatal,
            _ => RetryClass::Retryable,
        }
    }
}

/// What the caller should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep, then re-sign and resubmit.
    Backoff(Duration),
    /// Re-synchronize the clock, then re-sign and resubmit immediately.
    Resync,
    /// Stop; surface the failure.
    GiveUp(FailureKind),
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Stateless classification and backoff computation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Classify a transport failure.
    pub fn classify(&self, error: &TransportError) -> FailureKind {
        match error {
            TransportError::Timeout(_) | TransportError::Connection(_) => FailureKind::Network,
            TransportError::Malformed(_) => FailureKind::Malformed,
            TransportError::Http {
                status,
                code,
                retry_after,
                ..
            } => match (*status, *code) {
                (_, Some(CODE_TIMESTAMP_OUTSIDE_WINDOW | CODE_INVALID_SIGNATURE)) => {
                    FailureKind::TimestampRejected
                }
                (429 | 418, _) | (_, Some(CODE_TOO_MANY_REQUESTS | CODE_TOO_MANY_ORDERS)) => {
                    FailureKind::RateLimited {
                        retry_after: *retry_after,
                    }
                }
                (_, Some(CODE_UNKNOWN | CODE_DISCONNECTED | CODE_BACKEND_TIMEOUT)) => {
                    FailureKind::Server
                }
                (408, _) | (500..=599, _) => FailureKind::Server,
                _ => FailureKind::Rejected,
            },
        }
    }

    /// Backoff after failed attempt number `attempt` (1-based).
    ///
    /// `initial_backoff × multiplier^(attempt-1)`, capped at `max_backoff`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let max = Duration::from_millis(self.config.max_backoff_ms);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let ms = self.config.initial_backoff_ms as f64 * self.config.multiplier.powi(exponent);

        if !ms.is_finite() || ms >= max.as_millis() as f64 {
            return max;
        }
        Duration::from_millis(ms.max(0.0) as u64)
    }

    /// Delay before retrying a rate-limited attempt.
    pub fn rate_limit_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(Duration::from_millis(self.config.max_rate_limit_wait_ms)),
            None => self.next_delay(attempt),
        }
    }

    /// Start tracking a fresh order submission.
    pub fn tracker(&self) -> RetryTracker<'_> {
        RetryTracker::new(self)
    }
}

// ============================================================================
// RetryTracker
// ============================================================================

/// Retry state for one logical submission.
///
/// Attempts start at 1 (the first submission). A timestamp rejection is
/// granted exactly one re-sync outside the attempt budget; a second one
/// gives up.
#[derive(Debug)]
pub struct RetryTracker<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
    resynced: bool,
}

impl<'a> RetryTracker<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 1,
            resynced: false,
        }
    }

    /// Current attempt number (1-based).
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    pub fn has_resynced(&self) -> bool {
        self.resynced
    }

    /// Decide what to do after the current attempt failed with `error`.
    pub fn on_failure(&mut self, error: &TransportError) -> RetryDecision {
        let kind = self.policy.classify(error);

        match kind {
            FailureKind::Rejected | FailureKind::Malformed => RetryDecision::GiveUp(kind),
            FailureKind::TimestampRejected => {
                if self.resynced {
                    RetryDecision::GiveUp(kind)
                } else {
                    self.resynced = true;
                    RetryDecision::Resync
                }
            }
            FailureKind::Network | FailureKind::Server | FailureKind::RateLimited { .. } => {
                if self.attempt >= self.policy.config.max_attempts {
                    return RetryDecision::GiveUp(kind);
                }
                let delay = match kind {
                    FailureKind::RateLimited { retry_after } => {
                        self.policy.rate_limit_delay(self.attempt, retry_after)
                    }
                    _ => self.policy.next_delay(self.attempt),
                };
                self.attempt += 1;
                RetryDecision::Backoff(delay)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, code: Option<i64>) -> TransportError {
        TransportError::Http {
            status,
            code,
            message: "test".to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn test_classify_table() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.classify(&TransportError::Timeout("t".into())),
            FailureKind::Network
        );
        assert_eq!(
            policy.classify(&TransportError::Connection("reset".into())),
            FailureKind::Network
        );
        assert_eq!(policy.classify(&http(503, None)), FailureKind::Server);
        assert_eq!(policy.classify(&http(408, None)), FailureKind::Server);
        assert_eq!(policy.classify(&http(400, Some(-1000))), FailureKind::Server);
        assert_eq!(
            policy.classify(&http(429, None)),
            FailureKind::RateLimited { retry_after: None }
        );
        assert_eq!(
            policy.classify(&http(400, Some(-1015))),
            FailureKind::RateLimited { retry_after: None }
        );
        assert_eq!(
            policy.classify(&http(400, Some(-1021))),
            FailureKind::TimestampRejected
        );
        assert_eq!(
            policy.classify(&http(400, Some(-1022))),
            FailureKind::TimestampRejected
        );
        assert_eq!(policy.classify(&http(400, Some(-1121))), FailureKind::Rejected);
        assert_eq!(policy.classify(&http(404, None)), FailureKind::Rejected);
        assert_eq!(
            policy.classify(&TransportError::Malformed("x".into())),
            FailureKind::Malformed
        );
    }

    #[test]
    fn test_fatal_classes() {
        assert_eq!(FailureKind::Rejected.class(), RetryClass::Fatal);
        assert_eq!(FailureKind::Malformed.class(), RetryClass::Fatal);
        assert_eq!(FailureKind::TimestampRejected.class(), RetryClass::Retryable);
        assert_eq!(FailureKind::Server.class(), RetryClass::Retryable);
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
            multiplier: 2.0,
            ..RetryConfig::default()
        });

        assert_eq!(policy.next_delay(1), Duration::from_millis(100));
        assert_eq!(policy.next_delay(2), Duration::from_millis(200));
        assert_eq!(policy.next_delay(4), Duration::from_millis(800));
        assert_eq!(policy.next_delay(5), Duration::from_millis(1000));
        assert_eq!(policy.next_delay(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_rate_limit_hint_is_honored_and_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_rate_limit_wait_ms: 5000,
            ..RetryConfig::default()
        });

        assert_eq!(
            policy.rate_limit_delay(1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.rate_limit_delay(1, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
        assert_eq!(policy.rate_limit_delay(1, None), policy.next_delay(1));
    }

    #[test]
    fn test_tracker_exhausts_budget() {
        let policy = RetryPolicy::default();
        let mut tracker = policy.tracker();
        let err = TransportError::Timeout("t".into());

        assert!(matches!(tracker.on_failure(&err), RetryDecision::Backoff(_)));
        assert!(matches!(tracker.on_failure(&err), RetryDecision::Backoff(_)));
        assert_eq!(
            tracker.on_failure(&err),
            RetryDecision::GiveUp(FailureKind::Network)
        );
        assert_eq!(tracker.attempts(), 3);
    }

    #[test]
    fn test_tracker_never_retries_rejection() {
        let policy = RetryPolicy::default();
        let mut tracker = policy.tracker();

        assert_eq!(
            tracker.on_failure(&http(400, Some(-2019))),
            RetryDecision::GiveUp(FailureKind::Rejected)
        );
        assert_eq!(tracker.attempts(), 1);
    }

    #[test]
    fn test_tracker_resyncs_exactly_once() {
        let policy = RetryPolicy::default();
        let mut tracker = policy.tracker();
        let err = http(400, Some(-1021));

        assert_eq!(tracker.on_failure(&err), RetryDecision::Resync);
        assert!(tracker.has_resynced());
        assert_eq!(
            tracker.on_failure(&err),
            RetryDecision::GiveUp(FailureKind::TimestampRejected)
        );
    }

    #[test]
    fn test_config_defaults_from_empty_object() {
        let config: RetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RetryConfig::default());
        assert_eq!(config.max_attempts, 3);
    }
}
