//! Document upload, listing and deletion
//!
//! Keeps the document table of the log store and the retrieval index in
//! step: a document is listed only while its chunks are searchable.

use std::path::Path;
use std::sync::Arc;

use crate::error::{DocQaError, Result};
use crate::retrieval::{Retriever, TextChunker};
use crate::store::{DocumentRecord, LogStore};

/// File formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 3] = [Self::Text, Self::Markdown, Self::Pdf];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Markdown => "md",
            Self::Pdf => "pdf",
        }
    }

    /// Format named by the file's extension, case-insensitively.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Plain text of an uploaded file.
async fn extract_text(format: DocumentFormat, filename: &str, bytes: &[u8]) -> Result<String> {
    match format {
        DocumentFormat::Text | DocumentFormat::Markdown => std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| DocQaError::UnsupportedDocument(format!("{filename} is not UTF-8 text: {e}"))),
        DocumentFormat::Pdf => {
            let bytes = bytes.to_vec();
            // pdf-extract can panic on malformed input; the join error covers that
            match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(DocQaError::UnsupportedDocument(format!(
                    "Failed to extract text from {filename}: {e}"
                ))),
                Err(_) => Err(DocQaError::UnsupportedDocument(format!(
                    "Failed to extract text from {filename}: malformed PDF"
                ))),
            }
        }
    }
}

pub struct DocumentService {
    store: Arc<dyn LogStore>,
    retriever: Arc<dyn Retriever>,
    chunker: TextChunker,
}

impl DocumentService {
    pub fn new(store: Arc<dyn LogStore>, retriever: Arc<dyn Retriever>, chunker: TextChunker) -> Self {
        Self {
            store,
            retriever,
            chunker,
        }
    }

    /// Store and index one uploaded file.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<DocumentRecord> {
        let filename = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DocQaError::UnsupportedDocument(filename.to_string()))?;

        let format = DocumentFormat::from_filename(filename).ok_or_else(|| {
            DocQaError::UnsupportedDocument(format!(
                "{filename}. Allowed types: {}",
                DocumentFormat::ALL
                    .iter()
                    .map(|f| format!(".{}", f.extension()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let text = extract_text(format, filename, bytes).await?;
        if text.trim().is_empty() {
            tracing::warn!(filename, "Document has no extractable text");
        }
        let chunks = self.chunker.split(&text);

        let record = self.store.insert_document(filename).await?;
        match self.retriever.index(record.id, chunks).await {
            Ok(indexed) => {
                tracing::info!(file_id = record.id, filename, chunks = indexed, "Indexed document");
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(file_id = record.id, filename, "Indexing failed, removing record: {e}");
                if let Err(cleanup) = self.store.delete_document(record.id).await {
                    tracing::error!(file_id = record.id, "Failed to remove document record: {cleanup}");
                }
                Err(DocQaError::DocumentOperationFailed(format!(
                    "Failed to index {filename}: {e}"
                )))
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<DocumentRecord>> {
        self.store.list_documents().await
    }

    /// Remove a document's chunks from the index, then its record.
    pub async fn delete(&self, file_id: i64) -> Result<()> {
        if self.store.get_document(file_id).await?.is_none() {
            return Err(DocQaError::DocumentNotFound(file_id));
        }

        let removed = self.retriever.delete(file_id).await.map_err(|e| {
            DocQaError::DocumentOperationFailed(format!(
                "Failed to delete document {file_id} from the index: {e}"
            ))
        })?;
        if !self.store.delete_document(file_id).await? {
            return Err(DocQaError::DocumentNotFound(file_id));
        }
        tracing::info!(file_id, chunks = removed, "Deleted document");
        Ok(())
    }
}
