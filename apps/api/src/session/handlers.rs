//! Axum route handlers for the Session API (the sidebar).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::session::{SessionPatch, SessionView};
use crate::state::AppState;

/// POST /api/v1/sessions
///
/// Opens a session seeded from the environment defaults.
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionView>) {
    let view = state.sessions.create().await;
    info!(session_id = %view.session_id, "Session created");
    (StatusCode::CREATED, Json(view))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.view(session_id).await?))
}

/// PATCH /api/v1/sessions/:id
///
/// Sidebar edits. An empty string clears a field.
pub async fn handle_update_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(patch): Json<SessionPatch>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.sessions.update(session_id, patch).await?))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(session_id).await?;
    info!(%session_id, "Session removed");
    Ok(StatusCode::NO_CONTENT)
}
