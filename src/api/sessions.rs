use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::types::{SessionDeleted, SessionHistory};
use crate::server::state::AppState;

/// GET /sessions - Every session, most recently started first.
pub async fn list_handler(State(state): State<AppState>) -> Response {
    match state.store.sessions().await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /sessions/:id - Turn history of one session.
pub async fn show_handler(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.store.history(&session_id).await {
        Ok(turns) => Json(SessionHistory { session_id, turns }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /sessions/:id - Remove every turn of one session.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.store.delete_session(&session_id).await {
        Ok(deleted) => {
            tracing::info!(session_id = %session_id, deleted, "Deleted session");
            Json(SessionDeleted {
                message: format!("Session {session_id} deleted"),
                deleted,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    }
}
