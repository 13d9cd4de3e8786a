//! Traffic Routing & Resilience Layer
//!
//! Staged, safe migration of live traffic from a legacy monolith backend to
//! a new microservice backend. Per incoming call the layer decides which
//! backend serves it, protects the new backend from cascading failure, and
//! bounds how long a caller waits for the new backend before falling back to
//! the proven one.
//!
//! # Components
//!
//! 1. [`TrafficRouter`] — routing decision engine combining the feature
//!    flag, operator overrides, canary allow-list, and percentage rollout
//!    over a consistent hash of the caller identity. The active
//!    [`RoutingConfig`] is a hot-swappable snapshot.
//! 2. [`CircuitBreaker`] — consecutive-failure state machine that suspends
//!    calls to a failing backend and probes it for recovery.
//! 3. [`TimeoutGuard`] — bounds the microservice attempt with a per-call
//!    deadline and transparently redirects to the monolith on timeout,
//!    failure, or an open circuit.
//!
//! The layer exposes no network protocol of its own; request handlers invoke
//! it in-process, supplying the caller identity and one closure per backend.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use traffic_router::{BoxError, RoutingConfig, TimeoutGuard, TrafficRouter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RoutingConfig {
//!     rollout_percent: 10,
//!     microservice_endpoint: Some("listings.internal:50053".into()),
//!     ..RoutingConfig::default()
//! };
//! let router = Arc::new(TrafficRouter::new(config)?);
//! let guard = TimeoutGuard::new(router);
//!
//! let outcome = guard
//!     .execute_with_timeout_or_monolith(
//!         "user42",
//!         false,
//!         "get_listing",
//!         || async { /* call the microservice */ Ok::<_, BoxError>(1) },
//!         || async { /* call the monolith */ Ok::<_, BoxError>(1) },
//!     )
//!     .await;
//!
//! tracing::info!(backend = outcome.served_by.as_str(), "listing served");
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod config;
pub mod decision;
pub mod errors;
pub mod guard;
pub mod hash;
pub mod metrics_defs;

pub use breaker::{BreakerCounts, CircuitBreaker, CircuitState};
pub use config::{CircuitBreakerConfig, ConfigError, RoutingConfig, ValidationError};
pub use decision::{RouteReason, RoutingDecision, TrafficRouter};
pub use errors::{BoxError, CallError};
pub use guard::{CallOutcome, ServedBy, TimeoutGuard};
