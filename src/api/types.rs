use serde::{Deserialize, Serialize};

use crate::backend::types::ChatMessage;
use crate::model::descriptor::ModelDescriptor;

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatBody {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Falls back to the configured default model
    #[serde(default)]
    pub model: Option<String>,
}

/// Body of `POST /delete-doc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDocBody {
    pub file_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub turns: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDeleted {
    pub message: String,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub default_model: String,
    pub models: Vec<ModelDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub models: usize,
    pub store: String,
    pub store_healthy: bool,
}
