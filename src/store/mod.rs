//! Session transcript log and document records
//!
//! Every chat turn is appended as one [`LogRecord`] once its stream has
//! ended. Session history is rebuilt from these records on every request.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::types::ChatMessage;
use crate::error::{DocQaError, Result};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// How a turn's stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// The backend finished normally
    Complete,
    /// The backend failed mid-stream; the response is the partial text
    Incomplete,
    /// The caller went away; the response is the partial text
    Cancelled,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Complete => "complete",
            TurnStatus::Incomplete => "incomplete",
            TurnStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "complete" => Ok(TurnStatus::Complete),
            "incomplete" => Ok(TurnStatus::Incomplete),
            "cancelled" => Ok(TurnStatus::Cancelled),
            other => Err(DocQaError::StoreUnavailable(format!(
                "unknown turn status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A turn about to be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub session_id: String,
    pub user_query: String,
    pub response: String,
    pub system_prompt: String,
    pub retrieved_context: String,
    pub model: String,
    pub status: TurnStatus,
}

/// A logged turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub session_id: String,
    pub user_query: String,
    pub response: String,
    pub system_prompt: String,
    pub retrieved_context: String,
    pub model: String,
    pub status: TurnStatus,
    pub created_at: DateTime<Utc>,
}

impl LogRecord {
    pub(crate) fn from_new(id: i64, record: NewLogRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id: record.session_id,
            user_query: record.user_query,
            response: record.response,
            system_prompt: record.system_prompt,
            retrieved_context: record.retrieved_context,
            model: record.model,
            status: record.status,
            created_at,
        }
    }
}

/// An uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
}

/// One row of the session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    /// Question of the session's first turn
    pub first_message: String,
    pub started_at: DateTime<Utc>,
    pub turns: usize,
}

/// Turn history as alternating user and assistant messages, oldest first.
pub fn history_from_records(records: &[LogRecord]) -> Vec<ChatMessage> {
    records
        .iter()
        .flat_map(|r| {
            [
                ChatMessage::user(r.user_query.as_str()),
                ChatMessage::assistant(r.response.as_str()),
            ]
        })
        .collect()
}

/// Durable storage for turn logs and document records.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one turn. Returns the assigned record id.
    async fn append(&self, record: NewLogRecord) -> Result<i64>;

    /// All turns of a session, oldest first.
    async fn records(&self, session_id: &str) -> Result<Vec<LogRecord>>;

    /// Session history as chat turns. Unknown sessions have an empty history.
    async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(history_from_records(&self.records(session_id).await?))
    }

    /// Every session, most recently started first.
    async fn sessions(&self) -> Result<Vec<SessionSummary>>;

    /// Remove every turn of a session. Returns how many were removed.
    async fn delete_session(&self, session_id: &str) -> Result<usize>;

    async fn insert_document(&self, filename: &str) -> Result<DocumentRecord>;

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>>;

    /// Returns whether a record existed.
    async fn delete_document(&self, id: i64) -> Result<bool>;

    /// All documents, newest first.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>>;

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn backend_name(&self) -> &str {
        "unknown"
    }
}
