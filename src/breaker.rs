//! Circuit breaker for the microservice backend.
//!
//! Consecutive-failure detector with three states. Closed passes calls
//! through and counts outcomes; `failure_threshold` consecutive failures open
//! the circuit. Open rejects every call without invoking the backend until
//! `open_timeout` elapses, then the next call goes through as a half-open
//! probe. Half-open allows up to `half_open_max_requests` concurrent probes;
//! one probe failure re-opens the circuit, `success_threshold` consecutive
//! successes close it.
//!
//! State is owned by this object for the process lifetime and mutated only
//! through [`CircuitBreaker::execute`]. Thresholds come from the caller's
//! current config snapshot on every call, so a hot reload changes behavior
//! going forward without resetting breaker state. The critical section is
//! limited to counter arithmetic; the wrapped operation runs outside the
//! lock.

use crate::config::CircuitBreakerConfig;
use crate::errors::CallError;
use crate::metrics_defs::{CIRCUIT_CALLS, CIRCUIT_STATE, CIRCUIT_TRANSITIONS};
use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    const fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Snapshot of the breaker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreakerCounts {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
}

struct BreakerInner {
    state: CircuitState,
    counts: BreakerCounts,
    half_open_in_flight: u32,
    // Bumped on every Open -> HalfOpen transition; a permit from an earlier
    // half-open episode must not decrement the current episode's count.
    half_open_epoch: u64,
    opened_at: Option<Instant>,
    window_started_at: Instant,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;

        metrics::counter!(
            CIRCUIT_TRANSITIONS.name,
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        metrics::gauge!(CIRCUIT_STATE.name).set(to.gauge_value());

        match to {
            CircuitState::Open => {
                tracing::warn!(
                    from = from.as_str(),
                    consecutive_failures = self.counts.consecutive_failures,
                    "circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!("circuit breaker half-open, probing backend");
            }
            CircuitState::Closed => {
                tracing::info!("circuit breaker closed, backend recovered");
            }
        }
    }
}

/// Decrements the half-open probe slot when a probe finishes, including when
/// its future is dropped mid-flight.
struct ProbePermit<'a> {
    inner: &'a Mutex<BreakerInner>,
    epoch: u64,
}

impl Drop for ProbePermit<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.half_open_epoch == self.epoch && inner.half_open_in_flight > 0 {
            inner.half_open_in_flight -= 1;
        }
    }
}

pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        CircuitBreaker {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                counts: BreakerCounts::default(),
                half_open_in_flight: 0,
                half_open_epoch: 0,
                opened_at: None,
                window_started_at: Instant::now(),
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn counts(&self) -> BreakerCounts {
        self.inner.lock().counts
    }

    /// Runs `f` under circuit protection.
    ///
    /// Rejected calls return [`CallError::CircuitOpen`] without invoking `f`,
    /// so callers can tell "backend is known-bad" from "backend ran and
    /// failed". A disabled breaker calls through with no state tracking.
    pub async fn execute<T, F, Fut>(
        &self,
        config: &CircuitBreakerConfig,
        operation: &str,
        f: F,
    ) -> Result<T, CallError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
    {
        if !config.enabled {
            return f().await;
        }

        let permit = match self.admit(config, operation) {
            Ok(permit) => permit,
            Err(err) => {
                metrics::counter!(
                    CIRCUIT_CALLS.name,
                    "outcome" => "rejected",
                    "operation" => operation.to_string()
                )
                .increment(1);
                return Err(err);
            }
        };

        let result = f().await;

        let outcome = match &result {
            Ok(_) => {
                self.on_success(config);
                "success"
            }
            Err(_) => {
                self.on_failure(config);
                "failure"
            }
        };
        drop(permit);

        metrics::counter!(
            CIRCUIT_CALLS.name,
            "outcome" => outcome,
            "operation" => operation.to_string()
        )
        .increment(1);

        result
    }

    /// Admission check. Returns a probe permit when the call is a half-open
    /// probe, or a rejection error while the circuit is open.
    fn admit(
        &self,
        config: &CircuitBreakerConfig,
        operation: &str,
    ) -> Result<Option<ProbePermit<'_>>, CallError> {
        let mut inner = self.inner.lock();
        inner.counts.total_requests += 1;
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                // Rolling window: stale consecutive counts from a past blip
                // must not accumulate toward the threshold.
                if config.window_reset_interval_ms > 0
                    && now.duration_since(inner.window_started_at) >= config.window_reset_interval()
                {
                    inner.counts.consecutive_failures = 0;
                    inner.counts.consecutive_successes = 0;
                    inner.window_started_at = now;
                }
                Ok(None)
            }
            CircuitState::Open => {
                let open_elapsed = inner
                    .opened_at
                    .map(|at| now.duration_since(at))
                    .unwrap_or_default();
                if open_elapsed >= config.open_timeout() {
                    inner.transition(CircuitState::HalfOpen);
                    inner.counts.consecutive_successes = 0;
                    inner.half_open_epoch += 1;
                    inner.half_open_in_flight = 1;
                    Ok(Some(ProbePermit {
                        inner: &self.inner,
                        epoch: inner.half_open_epoch,
                    }))
                } else {
                    Err(CallError::CircuitOpen {
                        operation: operation.to_string(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight >= config.half_open_max_requests {
                    Err(CallError::CircuitOpen {
                        operation: operation.to_string(),
                    })
                } else {
                    inner.half_open_in_flight += 1;
                    Ok(Some(ProbePermit {
                        inner: &self.inner,
                        epoch: inner.half_open_epoch,
                    }))
                }
            }
        }
    }

    fn on_success(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        inner.counts.total_successes += 1;
        inner.counts.consecutive_failures = 0;
        inner.counts.consecutive_successes += 1;

        if inner.state == CircuitState::HalfOpen
            && inner.counts.consecutive_successes >= config.success_threshold
        {
            inner.transition(CircuitState::Closed);
            inner.counts.consecutive_successes = 0;
            inner.opened_at = None;
            inner.window_started_at = Instant::now();
        }
    }

    fn on_failure(&self, config: &CircuitBreakerConfig) {
        let mut inner = self.inner.lock();
        inner.counts.total_failures += 1;
        inner.counts.consecutive_successes = 0;
        inner.counts.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed => {
                if inner.counts.consecutive_failures >= config.failure_threshold {
                    inner.transition(CircuitState::Open);
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                // One probe failure re-opens and resets the open-timeout clock.
                inner.transition(CircuitState::Open);
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }
}
