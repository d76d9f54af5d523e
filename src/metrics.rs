use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::time::Instant;
use tracing::info;

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .add_global_label("service", "peekai_backend")
        .install()?;

    info!("Metrics server started on :{}/metrics", port);
    Ok(())
}

/// Middleware to collect HTTP request metrics
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    gauge!("http_requests_active").increment(1.0);

    let response = next.run(req).await;
    let status = response.status();

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", status.as_str().to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
    gauge!("http_requests_active").decrement(1.0);

    if status.is_server_error() {
        counter!("http_errors_total", &labels[..2]).increment(1);
    }

    response
}

/// Count one relay call by delivery mode (`single`/`stream`) and outcome
pub fn track_relay_call(mode: &'static str, outcome: &'static str) {
    counter!("relay_calls_total", "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn track_jwt_validation(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("jwt_validations_total", "result" => result).increment(1);
}

pub fn track_billing_event(event_type: String, handled: bool) {
    let result = if handled { "handled" } else { "ignored" };
    counter!("billing_webhook_events_total", "event_type" => event_type, "result" => result)
        .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_without_recorder_is_noop() {
        track_relay_call("single", "success");
        track_relay_call("stream", "disconnected");
        track_jwt_validation(false);
        track_billing_event("checkout.session.completed".to_string(), true);
    }
}
