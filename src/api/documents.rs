use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::types::{DeleteDocBody, MessageResponse, UploadResponse};
use crate::error::DocQaError;
use crate::server::state::AppState;

/// POST /upload-doc - Store and index the multipart field `file`.
pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return DocQaError::UnsupportedDocument(format!("Invalid multipart body: {e}"))
                    .into_response();
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return DocQaError::UnsupportedDocument(format!("Failed to read upload: {e}"))
                    .into_response();
            }
        };

        return match state.documents.upload(&filename, &bytes).await {
            Ok(record) => Json(UploadResponse {
                message: format!(
                    "File {} has been successfully uploaded and indexed.",
                    record.filename
                ),
                file_id: record.id,
            })
            .into_response(),
            Err(e) => e.into_response(),
        };
    }

    DocQaError::UnsupportedDocument("missing multipart field 'file'".to_string()).into_response()
}

/// GET /list-docs - All uploaded documents, newest first.
pub async fn list_handler(State(state): State<AppState>) -> Response {
    match state.documents.list().await {
        Ok(docs) => Json(docs).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /delete-doc - Remove a document from the index and the document table.
pub async fn delete_handler(
    State(state): State<AppState>,
    Json(body): Json<DeleteDocBody>,
) -> Response {
    match state.documents.delete(body.file_id).await {
        Ok(()) => Json(MessageResponse {
            message: format!(
                "Document with file_id {} has been successfully deleted from the system.",
                body.file_id
            ),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
