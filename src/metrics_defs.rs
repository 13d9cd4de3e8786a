//! Metric definitions for the routing layer.
//!
//! All metrics are emitted through the `metrics` facade; with no recorder
//! installed they are no-ops, so an unavailable sink never affects routing
//! correctness.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const ROUTING_DECISIONS: MetricDef = MetricDef {
    name: "routing.decisions",
    metric_type: MetricType::Counter,
    description: "Routing decisions. Tagged with backend, reason.",
};

pub const ROUTE_DURATION: MetricDef = MetricDef {
    name: "route.duration",
    metric_type: MetricType::Histogram,
    description: "Backend call duration in milliseconds. Tagged with backend, operation.",
};

pub const MICROSERVICE_ERRORS: MetricDef = MetricDef {
    name: "microservice.errors",
    metric_type: MetricType::Counter,
    description: "Failed microservice calls. Tagged with error_type, operation.",
};

pub const MICROSERVICE_TIMEOUTS: MetricDef = MetricDef {
    name: "microservice.timeouts",
    metric_type: MetricType::Counter,
    description: "Microservice calls that exceeded their deadline. Tagged with operation.",
};

pub const FALLBACKS: MetricDef = MetricDef {
    name: "fallback.invocations",
    metric_type: MetricType::Counter,
    description: "Fallback invocations to the monolith. Tagged with reason, operation.",
};

pub const CIRCUIT_CALLS: MetricDef = MetricDef {
    name: "circuit.calls",
    metric_type: MetricType::Counter,
    description: "Circuit breaker call outcomes. Tagged with outcome (success, failure, rejected), operation.",
};

pub const CIRCUIT_TRANSITIONS: MetricDef = MetricDef {
    name: "circuit.transitions",
    metric_type: MetricType::Counter,
    description: "Circuit breaker state transitions. Tagged with from, to.",
};

pub const CIRCUIT_STATE: MetricDef = MetricDef {
    name: "circuit.state",
    metric_type: MetricType::Gauge,
    description: "Current circuit breaker state (0=closed, 1=open, 2=half_open).",
};

pub const ALL_METRICS: &[MetricDef] = &[
    ROUTING_DECISIONS,
    ROUTE_DURATION,
    MICROSERVICE_ERRORS,
    MICROSERVICE_TIMEOUTS,
    FALLBACKS,
    CIRCUIT_CALLS,
    CIRCUIT_TRANSITIONS,
    CIRCUIT_STATE,
];
