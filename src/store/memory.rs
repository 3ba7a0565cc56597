use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::Result;

use super::{DocumentRecord, LogRecord, LogStore, NewLogRecord, SessionSummary};

#[derive(Default)]
struct Inner {
    logs: Vec<LogRecord>,
    documents: Vec<DocumentRecord>,
    next_log_id: i64,
    next_document_id: i64,
}

/// In-memory log store for testing and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged turns across all sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.logs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append(&self, record: NewLogRecord) -> Result<i64> {
        let mut inner = self.inner.write().await;
        inner.next_log_id += 1;
        let id = inner.next_log_id;
        inner.logs.push(LogRecord::from_new(id, record, Utc::now()));
        Ok(id)
    }

    async fn records(&self, session_id: &str) -> Result<Vec<LogRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        let inner = self.inner.read().await;
        let mut order: Vec<&str> = Vec::new();
        let mut sessions: HashMap<&str, SessionSummary> = HashMap::new();

        for record in &inner.logs {
            sessions
                .entry(record.session_id.as_str())
                .and_modify(|s| s.turns += 1)
                .or_insert_with(|| {
                    order.push(record.session_id.as_str());
                    SessionSummary {
                        session_id: record.session_id.clone(),
                        first_message: record.user_query.clone(),
                        started_at: record.created_at,
                        turns: 1,
                    }
                });
        }

        Ok(order
            .into_iter()
            .rev()
            .filter_map(|id| sessions.remove(id))
            .collect())
    }

    async fn delete_session(&self, session_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.logs.len();
        inner.logs.retain(|r| r.session_id != session_id);
        Ok(before - inner.logs.len())
    }

    async fn insert_document(&self, filename: &str) -> Result<DocumentRecord> {
        let mut inner = self.inner.write().await;
        inner.next_document_id += 1;
        let record = DocumentRecord {
            id: inner.next_document_id,
            filename: filename.to_string(),
            upload_timestamp: Utc::now(),
        };
        inner.documents.push(record.clone());
        Ok(record)
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.documents.len();
        inner.documents.retain(|d| d.id != id);
        Ok(inner.documents.len() < before)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.documents.iter().rev().cloned().collect())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
