//! Error types for docqa

#[derive(Debug, thiserror::Error)]
pub enum DocQaError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Model {name} not found. Available models: {}", available.join(", "))]
    ModelNotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Failed to write log record: {0}")]
    LogWriteFailed(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Document operation failed: {0}")]
    DocumentOperationFailed(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Unsupported file type: {0}")]
    UnsupportedDocument(String),

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DocQaError>;

impl DocQaError {
    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DocQaError::EmptyQuery
                | DocQaError::ModelNotFound { .. }
                | DocQaError::DocumentNotFound(_)
                | DocQaError::UnsupportedDocument(_)
        )
    }
}

impl From<DocQaError> for axum::response::Response {
    fn from(err: DocQaError) -> Self {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let status = match &err {
            DocQaError::EmptyQuery | DocQaError::UnsupportedDocument(_) => StatusCode::BAD_REQUEST,
            DocQaError::ModelNotFound { .. } | DocQaError::DocumentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DocQaError::RetrievalFailed(_) => StatusCode::BAD_GATEWAY,
            DocQaError::StoreUnavailable(_) | DocQaError::BackendNotAvailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &err {
            DocQaError::ModelNotFound { available, .. } => serde_json::json!({
                "error": err.to_string(),
                "available_models": available,
            }),
            _ => serde_json::json!({ "error": err.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl axum::response::IntoResponse for DocQaError {
    fn into_response(self) -> axum::response::Response {
        self.into()
    }
}
