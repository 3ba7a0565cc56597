pub mod router;
pub mod state;

use crate::config::DocQaConfig;
use crate::dirs;
use crate::error::{DocQaError, Result};

/// Start the HTTP server with the given configuration.
pub async fn start(config: DocQaConfig) -> Result<()> {
    dirs::ensure_dirs()?;

    let bind_addr = config.bind_address();
    let app_state = state::AppState::from_config(config).await?;
    let app = router::build(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| DocQaError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DocQaError::Server(format!("Server error: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
