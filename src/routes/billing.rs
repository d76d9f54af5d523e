use crate::auth::AuthUser;
use crate::billing::webhook::SIGNATURE_HEADER;
use crate::billing::{CheckoutRequest, CheckoutResponse, PortalRequest, PortalResponse};
use crate::error::AppError;
use crate::server::Server;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use serde_json::{Value, json};

/// Routes that need a bearer token
pub fn create_billing_routes() -> Router<Server> {
    Router::new()
        .route("/billing/checkout", post(checkout))
        .route("/billing/portal", post(portal))
}

/// Stripe calls this without a bearer token; the payload signature authenticates it
pub fn create_billing_webhook_routes() -> Router<Server> {
    Router::new().route("/billing/webhook", post(webhook))
}

async fn checkout(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, AppError> {
    Ok(Json(server.billing.checkout(&user, &request).await?))
}

async fn portal(
    State(server): State<Server>,
    user: AuthUser,
    body: Bytes,
) -> Result<Json<PortalResponse>, AppError> {
    // The body is optional; an empty one falls back to the configured return URL
    let request: PortalRequest = if body.is_empty() {
        PortalRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };
    Ok(Json(server.billing.portal(&user, &request).await?))
}

async fn webhook(
    State(server): State<Server>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    server.billing.handle_webhook(&payload, signature).await?;
    Ok(Json(json!({ "received": true })))
}
