use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    HistogramVec, IntCounterVec, IntGaugeVec,
};

pub static REQ_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "edge_index_http_requests_total",
        "Total HTTP requests seen by the proxy",
        &["host"]
    )
        .expect("register edge_index_http_requests_total")
});

pub static INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "edge_index_http_inflight",
        "In-flight HTTP requests",
        &["host"]
    )
        .expect("register edge_index_http_inflight")
});

pub static REQ_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.002, 0.005, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0];
    register_histogram_vec!(
        "edge_index_http_request_duration_seconds",
        "End-to-end request duration in seconds",
        &["host"],
        buckets
    )
        .expect("register edge_index_http_request_duration_seconds")
});

pub static REWRITES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "edge_index_rewrites_total",
        "Request paths seen by the normalizer, by outcome",
        &["outcome"]
    )
        .expect("register edge_index_rewrites_total")
});

#[inline]
pub fn on_req_start(host: &str) {
    REQ_TOTAL.with_label_values(&[host]).inc();
    INFLIGHT.with_label_values(&[host]).inc();
}

#[inline]
pub fn on_req_end(host: &str, secs: f64) {
    INFLIGHT.with_label_values(&[host]).dec();
    REQ_DURATION.with_label_values(&[host]).observe(secs);
}

#[inline]
pub fn inc_rewrite(outcome: &str) {
    REWRITES_TOTAL.with_label_values(&[outcome]).inc();
}
