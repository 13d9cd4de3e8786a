use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("rollout_percent must be in [0, 100], got {0}")]
    RolloutPercentOutOfRange(u8),

    #[error("microservice_endpoint is required when feature_enabled is true")]
    MissingMicroserviceEndpoint,

    #[error("microservice_call_timeout_ms must be greater than 0 when feature_enabled is true")]
    ZeroCallTimeout,

    #[error("circuit_breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("circuit_breaker.success_threshold must be at least 1")]
    ZeroSuccessThreshold,

    #[error("circuit_breaker.half_open_max_requests must be at least 1")]
    ZeroHalfOpenMaxRequests,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
}

/// Routing configuration for the monolith → microservice migration.
///
/// Immutable per decision. The active config is replaced as a whole unit on
/// reload; in-flight calls keep the snapshot they started with.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RoutingConfig {
    /// Master feature flag. When false, every call routes to the monolith.
    #[serde(default = "default_true")]
    pub feature_enabled: bool,
    /// Percentage of general traffic eligible for the microservice (0-100).
    #[serde(default = "default_rollout_percent")]
    pub rollout_percent: u8,
    /// Admins always route to the microservice, regardless of rollout.
    #[serde(default = "default_true")]
    pub admin_override: bool,
    /// Caller IDs that always route to the microservice.
    #[serde(default)]
    pub canary_ids: HashSet<String>,
    /// Endpoint of the microservice backend. Required when the feature flag
    /// is enabled; the routing layer itself never dials it, but refusing to
    /// start without one catches broken deployments at load time.
    #[serde(default)]
    pub microservice_endpoint: Option<String>,
    /// Per-call deadline for the microservice attempt.
    #[serde(default = "default_call_timeout_ms")]
    pub microservice_call_timeout_ms: u64,
    /// Fall back to the monolith when the microservice fails or times out.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    /// Time the circuit stays open before allowing a probe.
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
    /// Maximum concurrent probe requests while half-open.
    #[serde(default = "default_half_open_max_requests")]
    pub half_open_max_requests: u32,
    /// Interval after which consecutive counters reset while closed, so stale
    /// failures from a past blip do not accumulate toward the threshold.
    #[serde(default = "default_window_reset_interval_ms")]
    pub window_reset_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_rollout_percent() -> u8 {
    100
}

fn default_call_timeout_ms() -> u64 {
    500
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_open_timeout_ms() -> u64 {
    60_000
}

fn default_half_open_max_requests() -> u32 {
    3
}

fn default_window_reset_interval_ms() -> u64 {
    60_000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            enabled: true,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            open_timeout_ms: default_open_timeout_ms(),
            half_open_max_requests: default_half_open_max_requests(),
            window_reset_interval_ms: default_window_reset_interval_ms(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            feature_enabled: true,
            rollout_percent: default_rollout_percent(),
            admin_override: true,
            canary_ids: HashSet::new(),
            microservice_endpoint: None,
            microservice_call_timeout_ms: default_call_timeout_ms(),
            fallback_enabled: true,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RoutingConfig {
    /// Loads the routing configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: RoutingConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the routing configuration.
    ///
    /// Called at startup and before every hot reload; an invalid config never
    /// becomes the active snapshot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rollout_percent > 100 {
            return Err(ValidationError::RolloutPercentOutOfRange(
                self.rollout_percent,
            ));
        }

        if self.feature_enabled {
            match &self.microservice_endpoint {
                Some(endpoint) if !endpoint.is_empty() => {}
                _ => return Err(ValidationError::MissingMicroserviceEndpoint),
            }

            if self.microservice_call_timeout_ms == 0 {
                return Err(ValidationError::ZeroCallTimeout);
            }
        }

        self.circuit_breaker.validate()?;

        Ok(())
    }

    pub fn microservice_call_timeout(&self) -> Duration {
        Duration::from_millis(self.microservice_call_timeout_ms)
    }
}

impl CircuitBreakerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        if self.failure_threshold == 0 {
            return Err(ValidationError::ZeroFailureThreshold);
        }
        if self.success_threshold == 0 {
            return Err(ValidationError::ZeroSuccessThreshold);
        }
        if self.half_open_max_requests == 0 {
            return Err(ValidationError::ZeroHalfOpenMaxRequests);
        }

        Ok(())
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn window_reset_interval(&self) -> Duration {
        Duration::from_millis(self.window_reset_interval_ms)
    }
}
