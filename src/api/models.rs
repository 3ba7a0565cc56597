use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::api::types::{HealthResponse, ModelList};
use crate::server::state::AppState;

/// GET /models - Configured models and the default.
pub async fn list_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(ModelList {
        default_model: state.default_model(),
        models: state.registry().list(),
    })
}

/// GET /health - Liveness plus a store probe.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.store.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("Store health check failed: {e}");
            false
        }
    };

    Json(HealthResponse {
        status: if store_healthy { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models: state.registry().count(),
        store: state.store.backend_name().to_string(),
        store_healthy,
    })
}
