//! Retrieval oracle
//!
//! Maps a question to the passages most relevant to it. The index itself
//! (embeddings, vector storage) lives behind the [`Retriever`] trait.

pub mod chunker;
pub mod http;
pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{RetrieverBackend, RetrieverConfig};
use crate::error::{DocQaError, Result};

pub use chunker::TextChunker;
pub use http::HttpRetriever;
pub use local::LocalRetriever;

/// One retrieved text passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    /// Document the passage was indexed from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file_id: None,
        }
    }
}

/// A searchable index of document chunks.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `k` passages, most relevant first. An empty index yields no passages.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>>;

    /// Add the chunks of one document. Returns how many were indexed.
    async fn index(&self, file_id: i64, chunks: Vec<String>) -> Result<usize>;

    /// Remove every chunk of one document. Returns how many were removed.
    async fn delete(&self, file_id: i64) -> Result<usize>;
}

/// Join passages into the context block of a prompt.
pub fn join_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the retriever selected by the `[retriever]` config table.
pub async fn from_config(config: &RetrieverConfig) -> Result<Arc<dyn Retriever>> {
    match config.backend {
        RetrieverBackend::Local => {
            let retriever = LocalRetriever::open(&config.index_path).await?;
            Ok(Arc::new(retriever))
        }
        RetrieverBackend::Http => {
            let url = config.url.as_deref().ok_or_else(|| {
                DocQaError::Config("retriever.url is required for the http backend".to_string())
            })?;
            Ok(Arc::new(HttpRetriever::new(url)))
        }
    }
}
