//! Request governor: breaker gating, timeout, jitter and in-flight
//! de-duplication for outbound reads.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::debug;

use autopromptr_config::GovernorConfig;

use crate::breaker::{CircuitBreaker, Decision};
use crate::error::GovernorError;
use crate::failure::{FailureKind, RequestFailure};

type SharedCall<T> = Shared<BoxFuture<'static, Result<T, GovernorError>>>;

struct InFlight<T> {
    id: u64,
    call: SharedCall<T>,
}

/// Governs calls that produce a `T`.
///
/// Several governors may share one [`CircuitBreaker`] so that failures on
/// any endpoint slow down all of them.
pub struct RequestGovernor<T> {
    breaker: Arc<CircuitBreaker>,
    in_flight: Arc<Mutex<HashMap<String, InFlight<T>>>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    jitter_max: Duration,
}

impl<T> RequestGovernor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a governor with its own breaker.
    pub fn new(config: GovernorConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.clone()));
        Self::with_breaker(breaker, &config)
    }

    /// Create a governor over a shared breaker.
    pub fn with_breaker(breaker: Arc<CircuitBreaker>, config: &GovernorConfig) -> Self {
        Self {
            breaker,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            request_timeout: config.request_timeout(),
            jitter_max: config.jitter_max(),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Number of keys with an outstanding call.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Run `request` under the governor.
    ///
    /// While a call for `key` is outstanding, later callers with the same key
    /// do not invoke `request`; they wait for and receive the outstanding
    /// call's outcome.
    pub async fn call<F, Fut>(&self, key: &str, request: F) -> Result<T, GovernorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RequestFailure>> + Send + 'static,
    {
        let call = {
            let mut in_flight = self.in_flight.lock();

            if let Decision::Denied(denial) = self.breaker.can_make_request() {
                debug!("Governed request '{}' rejected: {}", key, denial);
                return Err(GovernorError::Rejected(denial));
            }

            match in_flight.get(key) {
                Some(existing) => {
                    debug!("Joining in-flight request '{}'", key);
                    existing.call.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let call = self.start(key.to_string(), id, request()).boxed().shared();
                    in_flight.insert(
                        key.to_string(),
                        InFlight {
                            id,
                            call: call.clone(),
                        },
                    );
                    call
                }
            }
        };

        call.await
    }

    fn start<Fut>(
        &self,
        key: String,
        id: u64,
        request: Fut,
    ) -> impl Future<Output = Result<T, GovernorError>> + Send + 'static
    where
        Fut: Future<Output = Result<T, RequestFailure>> + Send + 'static,
    {
        let breaker = self.breaker.clone();
        let in_flight = self.in_flight.clone();
        let request_timeout = self.request_timeout;
        let jitter = jitter(self.jitter_max);

        async move {
            if !jitter.is_zero() {
                tokio::time::sleep(jitter).await;
            }

            let outcome = match tokio::time::timeout(request_timeout, request).await {
                Ok(Ok(value)) => {
                    breaker.record_success();
                    Ok(value)
                }
                Ok(Err(failure)) => {
                    breaker.record_failure(failure.kind);
                    Err(GovernorError::Failed {
                        kind: failure.kind,
                        message: failure.message,
                    })
                }
                Err(_) => {
                    breaker.record_failure(FailureKind::Timeout);
                    Err(GovernorError::Failed {
                        kind: FailureKind::Timeout,
                        message: "Request timeout".to_string(),
                    })
                }
            };

            let mut in_flight = in_flight.lock();
            if in_flight.get(&key).is_some_and(|entry| entry.id == id) {
                in_flight.remove(&key);
            }
            outcome
        }
    }
}

/// Random delay in `[0, max)` derived from the clock's sub-second nanos.
fn jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    max.mul_f64(nanos as f64 / 1_000_000_000.0)
}

#[cfg(test)]
#[path = "governor_tests.rs"]
mod tests;
