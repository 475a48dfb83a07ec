//! Metrics definitions for the experiment core.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BUCKET_ASSIGNED: MetricDef = MetricDef {
    name: "bucket.assigned",
    metric_type: MetricType::Counter,
    description: "Number of bucket assignments computed. Tagged with source (override, ip).",
};

pub const BUCKET_OVERRIDE_REJECTED: MetricDef = MetricDef {
    name: "bucket.override_rejected",
    metric_type: MetricType::Counter,
    description: "Number of override parameters that were malformed or out of range",
};

pub const ALL_METRICS: &[MetricDef] = &[BUCKET_ASSIGNED, BUCKET_OVERRIDE_REJECTED];
