use crate::auth::AuthUser;
use crate::error::AppError;
use crate::history::{ExportRequest, ExportResponse, HistoryPage, RecentQueries};
use crate::server::Server;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

pub fn create_history_routes() -> Router<Server> {
    Router::new()
        .route("/history", get(list_history).delete(clear_history))
        .route("/history/recent", get(recent_history))
        .route("/history/export", post(export_history))
        .route("/history/{id}", delete(delete_query))
}

async fn list_history(
    State(server): State<Server>,
    user: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, AppError> {
    let page = server
        .history
        .page(&user.user_id, query.limit, query.offset)
        .await?;
    Ok(Json(page))
}

async fn recent_history(
    State(server): State<Server>,
    user: AuthUser,
) -> Result<Json<RecentQueries>, AppError> {
    Ok(Json(server.history.recent(&user.user_id).await?))
}

async fn delete_query(
    State(server): State<Server>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    server.history.delete(&user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_history(
    State(server): State<Server>,
    user: AuthUser,
) -> Result<StatusCode, AppError> {
    server.history.clear(&user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_history(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    Ok(Json(server.history.export(&user.user_id, &request).await?))
}
