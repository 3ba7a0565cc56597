use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::sse::sse_response;
use crate::api::types::ChatBody;
use crate::orchestrator::ChatTurnRequest;
use crate::server::state::AppState;

/// POST /chat - Stream an answer as `{"token", "session_id"}` events.
///
/// Errors found before streaming starts are returned as a JSON error body.
/// Once streaming has started the response is always 200; a backend
/// failure just ends the event stream early.
pub async fn handler(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Response {
    let model = body
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model());

    let request = ChatTurnRequest {
        question: body.question,
        session_id: body.session_id,
        model,
    };

    match state.orchestrator.handle(request).await {
        Ok(stream) => sse_response(stream).into_response(),
        Err(e) => {
            if e.is_client_error() {
                tracing::debug!("Rejected chat request: {e}");
            } else {
                tracing::error!("Chat request failed: {e}");
            }
            e.into_response()
        }
    }
}
