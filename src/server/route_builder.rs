use crate::auth::{AuthUser, auth_middleware};
use crate::server::Server;
use crate::utils::RequestIdExt;
use axum::{
    Router,
    body::Body,
    extract::Request,
    middleware::{self, Next},
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Put `routes` behind bearer-token authentication
pub fn protected(routes: Router<Server>, server: &Server) -> Router<Server> {
    routes.layer(middleware::from_fn_with_state(server.clone(), auth_middleware))
}

/// Structured request/response log line per API call
pub async fn request_response_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let request_id = req.extensions().request_id();

    info!(
        method = %method,
        path = %path,
        request_id = %request_id,
        "API request"
    );

    let start = Instant::now();
    let response = next.run(req).await;

    // Set by the auth layer, which runs inside this one
    let user = response
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.user_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        user = %user,
        request_id = %request_id,
        "API response"
    );

    response
}
