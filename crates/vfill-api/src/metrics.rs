//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vfill_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vfill_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vfill_http_requests_in_flight";

    // Upload metrics
    pub const UPLOADS_TOTAL: &str = "vfill_uploads_total";
    pub const UPLOAD_BYTES: &str = "vfill_upload_bytes";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vfill_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an upload and how its job ended.
pub fn record_upload(outcome: &str, bytes: u64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(path: &str) {
    let labels = [("path", sanitize_path(path))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

fn static_file_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^/static/(uploads|output)/[^/]+$").ok())
        .as_ref()
}

/// Collapse per-file static paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    match static_file_pattern() {
        Some(pattern) => pattern.replace(path, "/static/$1/:file").to_string(),
        None => path.to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
