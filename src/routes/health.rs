use crate::health::{HealthReport, HealthStatus};
use crate::server::Server;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct HealthCheckQuery {
    #[serde(default)]
    check: Option<String>,
}

pub fn create_health_routes() -> Router<Server> {
    Router::new().route("/health", get(health_check))
}

/// Runs every registered check (or `?check=<name>`); 503 when any is unhealthy
async fn health_check(
    State(server): State<Server>,
    Query(params): Query<HealthCheckQuery>,
) -> (StatusCode, Json<HealthReport>) {
    let report = server
        .health_service
        .check_health(params.check.as_deref())
        .await;

    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (status, Json(report))
}
