use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{DocQaError, Result};

use super::{DocumentRecord, LogRecord, LogStore, NewLogRecord, SessionSummary, TurnStatus};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS application_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    user_query TEXT NOT NULL,
    response TEXT NOT NULL,
    system_prompt TEXT NOT NULL,
    retrieved_context TEXT NOT NULL,
    model TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'complete',
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_application_logs_session
    ON application_logs(session_id, created_at, id);
CREATE TABLE IF NOT EXISTS document_store (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    upload_timestamp TEXT NOT NULL
);
";

/// SQLite-backed log store.
///
/// The connection sits behind a mutex and every statement runs on the
/// blocking pool, so writes are serialized and never stall the runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

fn log_record(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(LogRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_query: row.get(2)?,
        response: row.get(3)?,
        system_prompt: row.get(4)?,
        retrieved_context: row.get(5)?,
        model: row.get(6)?,
        status: TurnStatus::parse(&status).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: parse_ts(&created_at)?,
    })
}

fn document_record(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let uploaded: String = row.get(2)?;
    Ok(DocumentRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        upload_timestamp: parse_ts(&uploaded)?,
    })
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| {
            DocQaError::StoreUnavailable(format!(
                "Failed to open database {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!(path = %path.display(), "Opened log database");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocQaError::StoreUnavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| DocQaError::StoreUnavailable(format!("Failed to create schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<T, F>(&self, f: F) -> std::result::Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| "connection lock poisoned".to_string())?;
            f(&mut *guard).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| format!("database task failed: {e}"))?
    }
}

#[async_trait]
impl LogStore for SqliteStore {
    async fn append(&self, record: NewLogRecord) -> Result<i64> {
        let created_at = Utc::now();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO application_logs
                 (session_id, user_query, response, system_prompt, retrieved_context, model, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.session_id,
                    record.user_query,
                    record.response,
                    record.system_prompt,
                    record.retrieved_context,
                    record.model,
                    record.status.as_str(),
                    format_ts(created_at),
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(DocQaError::LogWriteFailed)
    }

    async fn records(&self, session_id: &str) -> Result<Vec<LogRecord>> {
        let session_id = session_id.to_string();
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, user_query, response, system_prompt, retrieved_context,
                        model, status, created_at
                 FROM application_logs
                 WHERE session_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt.query_map(params![session_id], log_record)?;
            rows.collect()
        })
        .await
        .map_err(DocQaError::StoreUnavailable)
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.session_id,
                        (SELECT f.user_query FROM application_logs f
                          WHERE f.session_id = l.session_id
                          ORDER BY f.created_at, f.id LIMIT 1),
                        MIN(l.created_at) AS started_at,
                        COUNT(*)
                 FROM application_logs l
                 GROUP BY l.session_id
                 ORDER BY started_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                let started_at: String = row.get(2)?;
                let turns: i64 = row.get(3)?;
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    first_message: row.get(1)?,
                    started_at: parse_ts(&started_at)?,
                    turns: turns as usize,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(DocQaError::StoreUnavailable)
    }

    async fn delete_session(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM application_logs WHERE session_id = ?1",
                params![session_id],
            )
        })
        .await
        .map_err(DocQaError::StoreUnavailable)
    }

    async fn insert_document(&self, filename: &str) -> Result<DocumentRecord> {
        let filename = filename.to_string();
        let uploaded = Utc::now();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO document_store (filename, upload_timestamp) VALUES (?1, ?2)",
                params![filename, format_ts(uploaded)],
            )?;
            Ok(DocumentRecord {
                id: conn.last_insert_rowid(),
                filename,
                upload_timestamp: uploaded,
            })
        })
        .await
        .map_err(DocQaError::DocumentOperationFailed)
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        self.call(move |conn| {
            conn.query_row(
                "SELECT id, filename, upload_timestamp FROM document_store WHERE id = ?1",
                params![id],
                document_record,
            )
            .optional()
        })
        .await
        .map_err(DocQaError::StoreUnavailable)
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        self.call(move |conn| {
            conn.execute("DELETE FROM document_store WHERE id = ?1", params![id])
                .map(|n| n > 0)
        })
        .await
        .map_err(DocQaError::DocumentOperationFailed)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, filename, upload_timestamp FROM document_store
                 ORDER BY upload_timestamp DESC, id DESC",
            )?;
            let rows = stmt.query_map([], document_record)?;
            rows.collect()
        })
        .await
        .map_err(DocQaError::StoreUnavailable)
    }

    async fn health_check(&self) -> Result<bool> {
        let value = self
            .call(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .optional()
            })
            .await
            .map_err(DocQaError::StoreUnavailable)?;
        Ok(value == Some(1))
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
