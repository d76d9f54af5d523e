use crate::auth::AuthUser;
use crate::error::AppError;
use crate::relay::{AskRequest, AskResponse, RelayEvent};
use crate::server::Server;
use axum::{
    Json, Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
};
use futures_util::{Stream, stream};
use serde_json::json;

pub fn create_ask_routes() -> Router<Server> {
    Router::new()
        .route("/ask", post(ask))
        .route("/ask/stream", post(ask_stream))
}

async fn ask(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let response = server.relay.ask(&user.user_id, request).await?;
    Ok(Json(response))
}

/// Streamed answer as server-sent events: one `data:` message per [`crate::relay::StreamChunk`],
/// or a single `error` event if the upstream fails mid-stream.
async fn ask_stream(
    State(server): State<Server>,
    user: AuthUser,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let receiver = server.relay.ask_stream(&user.user_id, request).await?;

    // Dropping the receiver (client gone) tells the relay to stop reading upstream
    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        Some((to_sse(event), receiver))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: RelayEvent) -> Result<Event, axum::Error> {
    match event {
        RelayEvent::Chunk(chunk) => Event::default().json_data(chunk),
        RelayEvent::Error(message) => Event::default()
            .event("error")
            .json_data(json!({ "error": message })),
    }
}
