use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
};

use crate::models::AttemptStatus;

lazy_static! {
    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Attempts
    pub static ref QUIZ_ATTEMPTS_STARTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempts_started_total",
        "Start requests by outcome (created or resumed)",
        &["outcome"]
    )
    .unwrap();

    pub static ref QUIZ_ATTEMPTS_FINALIZED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempts_finalized_total",
        "Attempts that reached a terminal state",
        &["status", "passed"]
    )
    .unwrap();

    pub static ref QUIZ_ATTEMPT_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_attempt_rejections_total",
        "Engine operations refused, by error code",
        &["operation", "reason"]
    )
    .unwrap();

    pub static ref QUIZ_SCORE_PERCENTAGE: Histogram = register_histogram!(
        "quiz_score_percentage",
        "Distribution of final attempt scores",
        vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    )
    .unwrap();

    pub static ref ATTEMPT_LOCK_WAIT_SECONDS: Histogram = register_histogram!(
        "quiz_attempt_lock_wait_seconds",
        "Time spent waiting for the per-learner attempt lock",
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .unwrap();
}

pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

pub fn record_attempt_started(resumed: bool) {
    let outcome = if resumed { "resumed" } else { "created" };
    QUIZ_ATTEMPTS_STARTED_TOTAL
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_attempt_finalized(status: AttemptStatus, passed: bool, score: f64) {
    QUIZ_ATTEMPTS_FINALIZED_TOTAL
        .with_label_values(&[status.as_str(), if passed { "true" } else { "false" }])
        .inc();
    QUIZ_SCORE_PERCENTAGE.observe(score);
}

pub fn record_rejection(operation: &str, reason: &str) {
    QUIZ_ATTEMPT_REJECTIONS_TOTAL
        .with_label_values(&[operation, reason])
        .inc();
}
