//! Circuit breaker with exponential backoff and a grace period.
//!
//! The breaker is closed until `failure_threshold` consecutive failures, then
//! opens for a cooldown that depends on the failure kind and the current
//! backoff level. Independently of open/closed, a long grace period blocks
//! all requests once `grace_failure_count` failures have piled up, until the
//! last failure is old enough.

use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use autopromptr_config::GovernorConfig;

use crate::failure::FailureKind;

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Too many failures recently; long pause.
    GracePeriod,
    /// Breaker open after failures of this kind.
    CircuitOpen(Option<FailureKind>),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::GracePeriod => f.write_str("Grace period active - too many failures"),
            DenialReason::CircuitOpen(Some(kind)) => {
                write!(f, "Circuit breaker open - {} error", kind)
            }
            DenialReason::CircuitOpen(None) => f.write_str("Circuit breaker open"),
        }
    }
}

/// A refused request with the time until the breaker would reconsider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenialReason,
    pub retry_in: Duration,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (retry in {}s)", self.reason, self.retry_in.as_secs())
    }
}

/// Answer of [`CircuitBreaker::can_make_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Coarse health derived from the breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Healthy,
    Degraded,
    CircuitOpen,
    GracePeriod,
}

impl fmt::Display for BreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakerStatus::Healthy => "healthy",
            BreakerStatus::Degraded => "degraded",
            BreakerStatus::CircuitOpen => "circuit_open",
            BreakerStatus::GracePeriod => "grace_period",
        })
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub status: BreakerStatus,
    pub is_open: bool,
    pub failure_count: u32,
    pub backoff_level: u32,
    pub error_kind: Option<FailureKind>,
    #[serde(serialize_with = "serialize_millis")]
    pub next_retry_in: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Default)]
struct BreakerState {
    is_open: bool,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_retry: Option<Instant>,
    backoff_level: u32,
    error_kind: Option<FailureKind>,
}

/// Thread-safe circuit breaker.
pub struct CircuitBreaker {
    config: GovernorConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Decide whether a request may be sent now.
    ///
    /// An open breaker whose cooldown has elapsed closes here and drops one
    /// backoff level.
    pub fn can_make_request(&self) -> Decision {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(remaining) = self.grace_remaining(&state, now) {
            return Decision::Denied(Denial {
                reason: DenialReason::GracePeriod,
                retry_in: remaining,
            });
        }

        if state.is_open {
            match state.next_retry {
                Some(next_retry) if now < next_retry => {
                    return Decision::Denied(Denial {
                        reason: DenialReason::CircuitOpen(state.error_kind),
                        retry_in: next_retry - now,
                    });
                }
                _ => {
                    state.is_open = false;
                    state.backoff_level = state.backoff_level.saturating_sub(1);
                    info!(
                        "Circuit breaker closed after cooldown (level {})",
                        state.backoff_level
                    );
                }
            }
        }

        Decision::Allowed
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.failure_count = 0;
        state.is_open = false;
        state.backoff_level = state.backoff_level.saturating_sub(1);
        state.error_kind = None;
        debug!("Circuit breaker: request succeeded, state reset");
    }

    /// Record a failed request.
    pub fn record_failure(&self, kind: FailureKind) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.failure_count += 1;
        state.last_failure = Some(now);
        state.error_kind = Some(kind);

        if state.failure_count >= self.config.failure_threshold {
            state.is_open = true;
            state.backoff_level = (state.backoff_level + 1).min(self.config.max_backoff_level);
            let backoff = self.backoff(kind, state.backoff_level);
            state.next_retry = Some(now + backoff);
            warn!(
                "Circuit breaker opened: {} error, backoff {:?}",
                kind, backoff
            );
        } else {
            debug!(
                "Circuit breaker: {} failure {}/{}",
                kind, state.failure_count, self.config.failure_threshold
            );
        }
    }

    /// Cooldown for a failure kind at a backoff level.
    pub fn backoff(&self, kind: FailureKind, level: u32) -> Duration {
        if kind == FailureKind::Cors {
            return self.config.cors_backoff();
        }
        let factor = 2u32.saturating_pow(level);
        self.config
            .base_backoff()
            .saturating_mul(factor)
            .min(self.config.max_backoff())
    }

    /// Current state for display.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let state = self.state.lock();

        let status = if self.grace_remaining(&state, now).is_some() {
            BreakerStatus::GracePeriod
        } else if state.is_open {
            BreakerStatus::CircuitOpen
        } else if state.failure_count > 0 {
            BreakerStatus::Degraded
        } else {
            BreakerStatus::Healthy
        };

        BreakerSnapshot {
            status,
            is_open: state.is_open,
            failure_count: state.failure_count,
            backoff_level: state.backoff_level,
            error_kind: state.error_kind,
            next_retry_in: state
                .next_retry
                .map(|t| t.saturating_duration_since(now))
                .unwrap_or_default(),
        }
    }

    /// Manually return to the initial closed state.
    pub fn reset(&self) {
        *self.state.lock() = BreakerState::default();
        info!("Circuit breaker manually reset");
    }

    fn grace_remaining(&self, state: &BreakerState, now: Instant) -> Option<Duration> {
        if state.failure_count < self.config.grace_failure_count {
            return None;
        }
        let since = now.saturating_duration_since(state.last_failure?);
        let grace = self.config.grace_period();
        (since < grace).then(|| grace - since)
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
