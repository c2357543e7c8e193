//! Metrics definitions for the badge service.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "ci_status.requests",
    metric_type: MetricType::Counter,
    description: "Requests handled. Tagged with endpoint, outcome.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "ci_status.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent querying the CI provider in seconds. Tagged with provider, outcome.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, UPSTREAM_DURATION];
