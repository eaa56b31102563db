//! Axum handlers for `/api/*` routes.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use super::AxumState;
use crate::error::RelayError;
use crate::subsystems::chat::ChatRequest;

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match self.detail() {
            Some(detail) => json!({ "error": self.to_string(), "detail": detail }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/chat
///
/// The body is read raw so malformed or mistyped payloads map to the
/// relay's 400 rather than axum's extractor rejections.
pub(super) async fn chat(State(state): State<AxumState>, body: Bytes) -> Response {
    let request = match ChatRequest::from_json(&body) {
        Ok(r) => r,
        Err(e) => {
            debug!(channel_id = %state.channel_id, "rejected chat request: {e}");
            return e.into_response();
        }
    };

    let span = info_span!(
        "chat",
        channel_id = %state.channel_id,
        request_id = %Uuid::new_v4(),
        session_id = %request.session_id
    );

    match state.relay.handle(request).instrument(span).await {
        Ok(message) => (StatusCode::OK, Json(json!({ "message": message }))).into_response(),
        Err(e) => {
            warn!(channel_id = %state.channel_id, status = e.status(), "chat request failed: {e}");
            e.into_response()
        }
    }
}

/// GET /api/health
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    let provider = state.relay.provider();
    let body = json!({
        "status": "ok",
        "provider": provider.name(),
        "model": provider.model(),
        "sessions": state.relay.sessions().len().await,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/sessions/{session_id}/transcript
pub(super) async fn session_transcript(
    State(state): State<AxumState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.relay.sessions().snapshot(&session_id).await {
        Some(entries) => (
            StatusCode::OK,
            Json(json!({ "session_id": session_id, "entries": entries })),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown session: {session_id}") })),
        )
            .into_response(),
    }
}
