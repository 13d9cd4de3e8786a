//! Timeout and fallback guard around microservice calls.
//!
//! Bounds how long a caller waits for the microservice before transparently
//! redirecting to the monolith. The per-call deadline is applied inside the
//! circuit-breaker wrap, so a timed-out call counts toward opening the
//! circuit. The fallback always runs without the primary's deadline: a
//! fallback invoked with an already-expired deadline would fail immediately
//! and defeat its purpose, so it races only against the caller's own
//! cancellation (dropping the composed future cancels whatever is in
//! flight).

use crate::breaker::CircuitBreaker;
use crate::decision::TrafficRouter;
use crate::errors::{BoxError, CallError};
use crate::metrics_defs::{FALLBACKS, MICROSERVICE_ERRORS, MICROSERVICE_TIMEOUTS, ROUTE_DURATION};
use std::sync::Arc;
use tokio::time::Instant;

/// Which backend actually served the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    Microservice,
    Monolith,
}

impl ServedBy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ServedBy::Microservice => "microservice",
            ServedBy::Monolith => "monolith",
        }
    }
}

/// Outcome of a guarded call, annotated with the backend that served it.
///
/// When both the primary and the fallback fail, `result` carries the
/// fallback's error and `used_fallback` is true, so callers can tell "the
/// legacy path is also unhealthy" from "only the new path is unhealthy".
#[derive(Debug)]
pub struct CallOutcome<T> {
    pub result: Result<T, CallError>,
    pub served_by: ServedBy,
    pub used_fallback: bool,
}

pub struct TimeoutGuard {
    router: Arc<TrafficRouter>,
    breaker: Arc<CircuitBreaker>,
}

impl TimeoutGuard {
    pub fn new(router: Arc<TrafficRouter>) -> Self {
        Self::with_breaker(router, Arc::new(CircuitBreaker::new()))
    }

    pub fn with_breaker(router: Arc<TrafficRouter>, breaker: Arc<CircuitBreaker>) -> Self {
        TimeoutGuard { router, breaker }
    }

    pub fn router(&self) -> &Arc<TrafficRouter> {
        &self.router
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Executes the microservice call under the configured deadline and
    /// circuit-breaker protection, falling back to the monolith on timeout,
    /// backend failure, or an open circuit.
    ///
    /// The fallback only starts after the primary has definitively failed;
    /// the two are never raced, to avoid doubling load on the legacy backend
    /// during normal operation.
    pub async fn execute_with_timeout<T, P, PFut, F, FFut>(
        &self,
        operation: &str,
        primary: P,
        fallback: Option<F>,
    ) -> CallOutcome<T>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, BoxError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, BoxError>>,
    {
        let config = self.router.config();
        let timeout = config.microservice_call_timeout();
        let timeout_ms = config.microservice_call_timeout_ms;

        let started = Instant::now();
        let attempt = || async move {
            match tokio::time::timeout(timeout, primary()).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CallError::Backend(err)),
                Err(_) => Err(CallError::DeadlineExceeded {
                    operation: operation.to_string(),
                    timeout_ms,
                }),
            }
        };
        let result = self
            .breaker
            .execute(&config.circuit_breaker, operation, attempt)
            .await;

        match result {
            Ok(value) => {
                record_duration(ServedBy::Microservice, operation, started);
                CallOutcome {
                    result: Ok(value),
                    served_by: ServedBy::Microservice,
                    used_fallback: false,
                }
            }
            Err(err) => {
                if matches!(err, CallError::DeadlineExceeded { .. }) {
                    metrics::counter!(
                        MICROSERVICE_TIMEOUTS.name,
                        "operation" => operation.to_string()
                    )
                    .increment(1);
                }
                metrics::counter!(
                    MICROSERVICE_ERRORS.name,
                    "error_type" => err.kind(),
                    "operation" => operation.to_string()
                )
                .increment(1);

                match fallback {
                    Some(fallback) if config.fallback_enabled => {
                        tracing::warn!(
                            operation,
                            error = %err,
                            error_type = err.kind(),
                            "microservice call failed, falling back to monolith"
                        );
                        metrics::counter!(
                            FALLBACKS.name,
                            "reason" => err.kind(),
                            "operation" => operation.to_string()
                        )
                        .increment(1);

                        let fallback_started = Instant::now();
                        let result = fallback().await.map_err(CallError::Backend);
                        record_duration(ServedBy::Monolith, operation, fallback_started);
                        CallOutcome {
                            result,
                            served_by: ServedBy::Monolith,
                            used_fallback: true,
                        }
                    }
                    _ => CallOutcome {
                        result: Err(err),
                        served_by: ServedBy::Microservice,
                        used_fallback: false,
                    },
                }
            }
        }
    }

    /// Routes the call via the decision engine and guards it accordingly.
    ///
    /// A monolith verdict calls the monolith closure directly with no
    /// deadline at all; only calls routed to the microservice pay the
    /// timeout/fallback cost.
    pub async fn execute_with_timeout_or_monolith<T, P, PFut, F, FFut>(
        &self,
        caller_id: &str,
        is_admin: bool,
        operation: &str,
        primary: P,
        monolith: F,
    ) -> CallOutcome<T>
    where
        P: FnOnce() -> PFut,
        PFut: Future<Output = Result<T, BoxError>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = Result<T, BoxError>>,
    {
        let decision = self.router.decide(caller_id, is_admin);
        if !decision.use_microservice {
            let started = Instant::now();
            let result = monolith().await.map_err(CallError::Backend);
            record_duration(ServedBy::Monolith, operation, started);
            return CallOutcome {
                result,
                served_by: ServedBy::Monolith,
                used_fallback: false,
            };
        }

        self.execute_with_timeout(operation, primary, Some(monolith))
            .await
    }
}

fn record_duration(backend: ServedBy, operation: &str, started: Instant) {
    metrics::histogram!(
        ROUTE_DURATION.name,
        "backend" => backend.as_str(),
        "operation" => operation.to_string()
    )
    .record(started.elapsed().as_secs_f64() * 1000.0);
}
