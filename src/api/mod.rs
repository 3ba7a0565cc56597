pub mod chat;
pub mod documents;
pub mod models;
pub mod sessions;
pub mod sse;
pub mod types;

use axum::routing::{get, post};
use axum::Router;

use crate::server::state::AppState;

/// Build the HTTP API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::handler))
        .route("/upload-doc", post(documents::upload_handler))
        .route("/list-docs", get(documents::list_handler))
        .route("/delete-doc", post(documents::delete_handler))
        .route("/sessions", get(sessions::list_handler))
        .route(
            "/sessions/:id",
            get(sessions::show_handler).delete(sessions::delete_handler),
        )
        .route("/models", get(models::list_handler))
        .route("/health", get(models::health_handler))
}
