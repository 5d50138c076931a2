// src/api/handlers.rs

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;

use crate::api::types::{error_response, from_bridge_error, ApiError};
use crate::api::{auth, ApiState};
use crate::core::types::{ChatCompletionRequest, ModelList};

/// POST /v1/chat/completions — Streamed (SSE) or single-shot completion.
pub async fn chat_completions(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    auth::check_auth(&state, &headers)?;

    let Json(request) = body.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {e}"))
    })?;

    if !request.wants_stream() {
        let completion = state
            .chat
            .complete(&request)
            .await
            .map_err(from_bridge_error)?;
        return Ok(Json(completion).into_response());
    }

    let frames = state
        .chat
        .stream(&request)
        .await
        .map_err(from_bridge_error)?;
    let events = frames.map(|frame| Ok::<_, Infallible>(Event::default().data(frame.data())));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// GET /v1/models — Public model names.
pub async fn list_models(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ModelList>, ApiError> {
    auth::check_auth(&state, &headers)?;
    Ok(Json(state.chat.models()))
}

/// GET /health — Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
