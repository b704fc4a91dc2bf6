//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, HistoryResponse, MessageRequest, MessageResponse,
    SuccessResponse,
};
use super::AppState;
use crate::runtime::SessionError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat start
        .route("/api/sessions", post(create_session))
        // Session end
        .route("/api/sessions/:id", axum::routing::delete(end_session))
        // Message received
        .route("/api/sessions/:id/messages", post(send_message))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/history", get(get_history))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session Lifecycle
// ============================================================

async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let start = state.sessions.start_session().await;
    let persona = state.sessions.persona();

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: start.session_id,
            ready: start.ready,
            bot_name: persona.bot_name,
            bot_role: persona.bot_role,
        }),
    )
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.end_session(&id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Messages
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.send_message(&id, req.text).await?;
    Ok(Json(MessageResponse { queued: true }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (init_event, broadcast_rx, guard) = state.sessions.subscribe(&id).await?;
    Ok(sse_stream(init_event, broadcast_rx, guard))
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let turns = state.sessions.history(&id).await?;
    Ok(Json(HistoryResponse {
        session_id: id,
        turns: turns.to_vec(),
    }))
}

async fn get_version() -> &'static str {
    concat!("specialist_relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => AppError::NotFound(err.to_string()),
            SessionError::Blocked => AppError::Conflict(err.to_string()),
            SessionError::Closed => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
