use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Edge request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const PAGE_CACHE_HIT: MetricDef = MetricDef {
    name: "page_cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of pages served from the anonymous page cache",
};

pub const PAGE_CACHE_MISS: MetricDef = MetricDef {
    name: "page_cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of pages rendered because the anonymous page cache missed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    PAGE_CACHE_HIT,
    PAGE_CACHE_MISS,
];
