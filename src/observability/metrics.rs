//! Metrics collection and exposition.
//!
//! # Metrics
//! - `jvs_http_requests_total` (counter): requests by method, route, status
//! - `jvs_http_request_duration_seconds` (histogram): latency distribution
//! - `jvs_validations_total` (counter): validations by schema, outcome
//! - `jvs_registered_schemas` (gauge): schemas in the registry
//! - `jvs_rate_limited_total` (counter): requests rejected by the rate limiter
//!
//! Recording without an installed exporter is a no-op, so library code
//! records unconditionally.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, route: &str, status: u16, start_time: Instant) {
    let status = status.to_string();
    counter!(
        "jvs_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "jvs_http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status
    )
    .record(start_time.elapsed().as_secs_f64());
}

pub fn record_validation(schema: &str, valid: bool) {
    let outcome = if valid { "valid" } else { "invalid" };
    counter!(
        "jvs_validations_total",
        "schema" => schema.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_registry_size(size: usize) {
    gauge!("jvs_registered_schemas").set(size as f64);
}

pub fn record_rate_limited() {
    counter!("jvs_rate_limited_total").increment(1);
}

/// Middleware recording count and latency per matched route.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start_time);
    response
}
