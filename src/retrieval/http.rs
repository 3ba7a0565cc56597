use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DocQaError, Result};

use super::{Passage, Retriever};

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    passages: Vec<Passage>,
}

#[derive(Serialize)]
struct IndexBody {
    file_id: i64,
    chunks: Vec<String>,
}

#[derive(Deserialize, Default)]
struct CountResponse {
    #[serde(default)]
    count: Option<usize>,
}

/// Client for an external retrieval service.
///
/// `POST {url}/query` searches, `POST {url}/documents` indexes and
/// `DELETE {url}/documents/{file_id}` removes a document's chunks.
pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{status}: {body}")
}

#[async_trait]
impl Retriever for HttpRetriever {
    fn name(&self) -> &str {
        "http"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&QueryBody { query, k })
            .send()
            .await
            .map_err(|e| DocQaError::RetrievalFailed(format!("{}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(DocQaError::RetrievalFailed(error_body(response).await));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| DocQaError::RetrievalFailed(format!("Invalid response: {e}")))?;
        let mut passages = body.passages;
        passages.truncate(k);
        Ok(passages)
    }

    async fn index(&self, file_id: i64, chunks: Vec<String>) -> Result<usize> {
        let sent = chunks.len();
        let response = self
            .client
            .post(format!("{}/documents", self.base_url))
            .json(&IndexBody { file_id, chunks })
            .send()
            .await
            .map_err(|e| DocQaError::DocumentOperationFailed(format!("{}: {e}", self.base_url)))?;

        if !response.status().is_success() {
            return Err(DocQaError::DocumentOperationFailed(error_body(response).await));
        }
        let body: CountResponse = response.json().await.unwrap_or_default();
        Ok(body.count.unwrap_or(sent))
    }

    async fn delete(&self, file_id: i64) -> Result<usize> {
        let response = self
            .client
            .delete(format!("{}/documents/{file_id}", self.base_url))
            .send()
            .await
            .map_err(|e| DocQaError::DocumentOperationFailed(format!("{}: {e}", self.base_url)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(DocQaError::DocumentOperationFailed(error_body(response).await));
        }
        let body: CountResponse = response.json().await.unwrap_or_default();
        Ok(body.count.unwrap_or(0))
    }
}
