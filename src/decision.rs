//! Routing decision engine.
//!
//! Chooses monolith vs. microservice per call from the active
//! [`RoutingConfig`] snapshot: feature flag first, then operator overrides
//! (admin, canary), then percentage rollout over the consistent hash. The
//! same caller always gets the same verdict at a fixed rollout percent, so a
//! user never flips backends between requests during a gradual ramp.

use crate::config::{RoutingConfig, ValidationError};
use crate::hash::{in_rollout, rollout_hash};
use crate::metrics_defs::ROUTING_DECISIONS;
use parking_lot::RwLock;
use std::sync::Arc;

/// Why a call was routed the way it was.
///
/// The reason fully explains the verdict: `feature_disabled`, `rollout_zero`
/// and `rollout_percent_miss` always mean monolith; every other reason always
/// means microservice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    FeatureDisabled,
    AdminOverride,
    CanaryUser,
    RolloutZero,
    RolloutFull,
    RolloutPercentHit,
    RolloutPercentMiss,
}

impl RouteReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RouteReason::FeatureDisabled => "feature_disabled",
            RouteReason::AdminOverride => "admin_override",
            RouteReason::CanaryUser => "canary_user",
            RouteReason::RolloutZero => "rollout_zero",
            RouteReason::RolloutFull => "rollout_full",
            RouteReason::RolloutPercentHit => "rollout_percent_hit",
            RouteReason::RolloutPercentMiss => "rollout_percent_miss",
        }
    }
}

/// A routing verdict, produced fresh per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub use_microservice: bool,
    pub reason: RouteReason,
    pub caller_id: String,
    pub is_admin: bool,
    pub is_canary: bool,
    pub hash: u32,
}

impl RoutingDecision {
    pub fn backend(&self) -> &'static str {
        if self.use_microservice {
            "microservice"
        } else {
            "monolith"
        }
    }
}

/// Routing decision engine over a hot-swappable config snapshot.
///
/// `decide` is read-only over the snapshot; `update_config` swaps the whole
/// `Arc` under a brief write lock, so concurrent readers never observe a
/// partially-updated config and in-flight calls keep the snapshot they
/// started with.
pub struct TrafficRouter {
    config: RwLock<Arc<RoutingConfig>>,
}

impl TrafficRouter {
    /// Creates a router, rejecting an invalid config at startup.
    pub fn new(config: RoutingConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(TrafficRouter {
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// Returns the current config snapshot.
    pub fn config(&self) -> Arc<RoutingConfig> {
        self.config.read().clone()
    }

    /// Atomically replaces the active configuration.
    ///
    /// The new config is validated first; on error the previous snapshot
    /// stays active. In-flight calls are not interrupted.
    pub fn update_config(&self, new_config: RoutingConfig) -> Result<(), ValidationError> {
        new_config.validate()?;
        *self.config.write() = Arc::new(new_config);
        tracing::info!("routing config reloaded");
        Ok(())
    }

    /// Decides which backend serves a call.
    ///
    /// Priority order, first match wins: feature flag off → monolith; admin
    /// override → microservice; canary → microservice; rollout 0 → monolith;
    /// rollout 100 → microservice; otherwise consistent-hash bucketing.
    /// Admin and canary intentionally bypass the rollout-zero short-circuit
    /// so operators can validate the new backend with specific accounts
    /// before any general rollout.
    pub fn decide(&self, caller_id: &str, is_admin: bool) -> RoutingDecision {
        let config = self.config();
        let is_canary = config.canary_ids.contains(caller_id);
        let hash = rollout_hash(caller_id);

        let (use_microservice, reason) = if !config.feature_enabled {
            (false, RouteReason::FeatureDisabled)
        } else if is_admin && config.admin_override {
            (true, RouteReason::AdminOverride)
        } else if is_canary {
            (true, RouteReason::CanaryUser)
        } else if config.rollout_percent == 0 {
            (false, RouteReason::RolloutZero)
        } else if config.rollout_percent == 100 {
            (true, RouteReason::RolloutFull)
        } else if in_rollout(hash, config.rollout_percent) {
            (true, RouteReason::RolloutPercentHit)
        } else {
            (false, RouteReason::RolloutPercentMiss)
        };

        let decision = RoutingDecision {
            use_microservice,
            reason,
            caller_id: caller_id.to_string(),
            is_admin,
            is_canary,
            hash,
        };

        tracing::debug!(
            caller_id,
            is_admin,
            is_canary,
            hash,
            use_microservice,
            reason = reason.as_str(),
            "routing decision"
        );
        metrics::counter!(
            ROUTING_DECISIONS.name,
            "backend" => decision.backend(),
            "reason" => reason.as_str()
        )
        .increment(1);

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn router_with(config: RoutingConfig) -> TrafficRouter {
        TrafficRouter::new(config).expect("valid config")
    }

    fn base_config() -> RoutingConfig {
        RoutingConfig {
            microservice_endpoint: Some("localhost:50053".to_string()),
            ..RoutingConfig::default()
        }
    }

    #[test]
    fn test_feature_disabled_forces_monolith_for_everyone() {
        let router = router_with(RoutingConfig {
            feature_enabled: false,
            rollout_percent: 100,
            admin_override: true,
            canary_ids: HashSet::from(["user123".to_string()]),
            ..base_config()
        });

        // Canary, admin and regular users all go to the monolith.
        for (caller, is_admin) in [("user123", false), ("admin1", true), ("user999", false)] {
            let decision = router.decide(caller, is_admin);
            assert!(!decision.use_microservice);
            assert_eq!(decision.reason, RouteReason::FeatureDisabled);
        }
    }

    #[test]
    fn test_admin_and_canary_bypass_rollout_zero() {
        let router = router_with(RoutingConfig {
            rollout_percent: 0,
            admin_override: true,
            canary_ids: HashSet::from(["user123".to_string()]),
            ..base_config()
        });

        let decision = router.decide("user123", false);
        assert!(decision.use_microservice);
        assert_eq!(decision.reason, RouteReason::CanaryUser);
        assert!(decision.is_canary);

        let decision = router.decide("admin1", true);
        assert!(decision.use_microservice);
        assert_eq!(decision.reason, RouteReason::AdminOverride);
        assert!(decision.is_admin);

        let decision = router.decide("user999", false);
        assert!(!decision.use_microservice);
        assert_eq!(decision.reason, RouteReason::RolloutZero);
    }

    #[test]
    fn test_admin_override_takes_priority_over_canary() {
        let router = router_with(RoutingConfig {
            rollout_percent: 0,
            admin_override: true,
            canary_ids: HashSet::from(["admin1".to_string()]),
            ..base_config()
        });

        // Caller is both admin and canary; admin override wins.
        let decision = router.decide("admin1", true);
        assert!(decision.use_microservice);
        assert_eq!(decision.reason, RouteReason::AdminOverride);
        assert!(decision.is_canary);
    }

    #[test]
    fn test_admin_override_disabled_admins_follow_rollout() {
        let router = router_with(RoutingConfig {
            rollout_percent: 0,
            admin_override: false,
            ..base_config()
        });

        let decision = router.decide("admin1", true);
        assert!(!decision.use_microservice);
        assert_eq!(decision.reason, RouteReason::RolloutZero);
    }

    #[test]
    fn test_rollout_full_routes_everyone() {
        let router = router_with(RoutingConfig {
            rollout_percent: 100,
            admin_override: false,
            ..base_config()
        });

        for i in 0..100 {
            let decision = router.decide(&format!("user{i}"), false);
            assert!(decision.use_microservice);
            assert_eq!(decision.reason, RouteReason::RolloutFull);
        }
    }

    #[test]
    fn test_decision_is_deterministic() {
        let router = router_with(RoutingConfig {
            rollout_percent: 37,
            ..base_config()
        });

        let first = router.decide("user42", false);
        for _ in 0..50 {
            let decision = router.decide("user42", false);
            assert_eq!(decision.use_microservice, first.use_microservice);
            assert_eq!(decision.reason, first.reason);
            assert_eq!(decision.hash, first.hash);
        }
    }

    #[test]
    fn test_rollout_distribution() {
        for percent in [10u8, 50] {
            let router = router_with(RoutingConfig {
                rollout_percent: percent,
                admin_override: false,
                ..base_config()
            });

            let total = 1000;
            let routed = (0..total)
                .filter(|i| router.decide(&format!("user{i}"), false).use_microservice)
                .count();

            let fraction = routed as f64 / total as f64;
            let expected = f64::from(percent) / 100.0;
            assert!(
                (fraction - expected).abs() < 0.05,
                "rollout {percent}%: observed fraction {fraction}"
            );
        }

        // Exact boundaries
        let router = router_with(RoutingConfig {
            rollout_percent: 0,
            admin_override: false,
            ..base_config()
        });
        assert!((0..1000).all(|i| !router.decide(&format!("user{i}"), false).use_microservice));

        let router = router_with(RoutingConfig {
            rollout_percent: 100,
            admin_override: false,
            ..base_config()
        });
        assert!((0..1000).all(|i| router.decide(&format!("user{i}"), false).use_microservice));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = RoutingConfig {
            rollout_percent: 101,
            ..base_config()
        };
        assert!(TrafficRouter::new(config).is_err());
    }

    #[test]
    fn test_update_config_swaps_snapshot() {
        let router = router_with(RoutingConfig {
            rollout_percent: 0,
            admin_override: false,
            ..base_config()
        });
        assert!(!router.decide("user1", false).use_microservice);

        router
            .update_config(RoutingConfig {
                rollout_percent: 100,
                admin_override: false,
                ..base_config()
            })
            .expect("valid update");
        assert!(router.decide("user1", false).use_microservice);
    }

    #[test]
    fn test_invalid_update_keeps_previous_config() {
        let router = router_with(RoutingConfig {
            rollout_percent: 100,
            ..base_config()
        });

        let result = router.update_config(RoutingConfig {
            rollout_percent: 100,
            microservice_endpoint: None,
            ..base_config()
        });
        assert!(result.is_err());

        // Previous valid snapshot remains active.
        assert_eq!(router.config().rollout_percent, 100);
        assert!(router.decide("user1", false).use_microservice);
    }
}
