use lazy_static::lazy_static;
use prometheus::{
    Gauge, Histogram, IntCounterVec, register_gauge, register_histogram,
    register_int_counter_vec,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portfolio_api_requests_total",
        "Total number of requests per route",
        &["route"]
    )
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portfolio_api_rate_limited_total",
        "Requests rejected by the rate limiter",
        &["route"]
    )
    .unwrap();
    pub static ref ERROR_TOTAL: IntCounterVec = register_int_counter_vec!(
        "portfolio_api_errors_total",
        "Failed requests by route and error code",
        &["route", "code"]
    )
    .unwrap();
    pub static ref UPSTREAM_LATENCY: Histogram = register_histogram!(
        "portfolio_api_upstream_latency_seconds",
        "Latency of calls to the generative AI API in seconds"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge = register_gauge!(
        "portfolio_api_rate_limit_entries",
        "Current number of tracked rate limit windows"
    )
    .unwrap();
}
