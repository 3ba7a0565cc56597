use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tantivy::collector::{Count, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, INDEXED, STORED, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::error::{DocQaError, Result};

use super::{Passage, Retriever};

/// Indexing heap shared by the writer threads.
const WRITER_HEAP_BYTES: usize = 50_000_000;

struct Inner {
    index: Index,
    reader: IndexReader,
    file_id: Field,
    content: Field,
    /// One writer at a time; tantivy refuses a second one.
    write_lock: Mutex<()>,
}

/// BM25 full-text index over document chunks, backed by tantivy.
///
/// Each chunk is one tantivy document with a stored `content` text field
/// and an indexed `file_id` used to drop a document's chunks. Opened with a
/// directory, the index lives on disk and survives restarts; commits made by
/// another process are picked up by the reader.
pub struct LocalRetriever {
    inner: Arc<Inner>,
    path: Option<PathBuf>,
}

fn schema() -> (Schema, Field, Field) {
    let mut builder = Schema::builder();
    let file_id = builder.add_i64_field("file_id", INDEXED | STORED);
    let content = builder.add_text_field("content", TEXT | STORED);
    (builder.build(), file_id, content)
}

/// Questions are free text: keep words only, lowercased so that `AND`, `OR`
/// and `NOT` stay terms instead of operators.
fn plain_terms(query: &str) -> String {
    query
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
}

fn index_error(context: &str) -> impl Fn(tantivy::TantivyError) -> DocQaError + '_ {
    move |e| DocQaError::RetrievalFailed(format!("{context}: {e}"))
}

impl LocalRetriever {
    /// A RAM-only index, lost on drop.
    pub fn in_memory() -> Result<Self> {
        let (schema, _, _) = schema();
        Self::from_index(Index::create_in_ram(schema), None)
    }

    /// Open the index stored in directory `path`, creating it if absent.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        tokio::fs::create_dir_all(&path).await?;

        let dir = path.clone();
        let index = tokio::task::spawn_blocking(move || {
            let directory = MmapDirectory::open(&dir).map_err(|e| {
                DocQaError::RetrievalFailed(format!("Failed to open index {}: {e}", dir.display()))
            })?;
            let (schema, _, _) = schema();
            Index::open_or_create(directory, schema).map_err(index_error("Failed to open index"))
        })
        .await
        .map_err(|e| DocQaError::RetrievalFailed(format!("Index task failed: {e}")))??;

        let retriever = Self::from_index(index, Some(path))?;
        tracing::debug!(
            path = ?retriever.path(),
            chunks = retriever.len(),
            "Local index loaded"
        );
        Ok(retriever)
    }

    fn from_index(index: Index, path: Option<PathBuf>) -> Result<Self> {
        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                DocQaError::RetrievalFailed(format!("Index is missing the {name} field"))
            })
        };
        let file_id = field("file_id")?;
        let content = field("content")?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(index_error("Failed to open index reader"))?;

        Ok(Self {
            inner: Arc::new(Inner {
                index,
                reader,
                file_id,
                content,
                write_lock: Mutex::new(()),
            }),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.inner.reader.searcher().num_docs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run index work on the blocking pool.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| DocQaError::RetrievalFailed(format!("Index task failed: {e}")))?
    }
}

impl Inner {
    /// Apply `edit` with a fresh writer, commit, and make the result visible.
    fn write<T>(&self, edit: impl FnOnce(&mut IndexWriter, &Self) -> tantivy::Result<T>) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DocQaError::DocumentOperationFailed("Index writer poisoned".to_string()))?;
        let commit = || -> tantivy::Result<T> {
            let mut writer: IndexWriter = self.index.writer(WRITER_HEAP_BYTES)?;
            let value = edit(&mut writer, self)?;
            writer.commit()?;
            self.reader.reload()?;
            Ok(value)
        };
        commit().map_err(|e| DocQaError::DocumentOperationFailed(format!("Index update failed: {e}")))
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.content]);
        let (query, _) = parser.parse_query_lenient(&plain_terms(query));

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(k))
            .map_err(index_error("Search failed"))?;

        let mut passages = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(index_error("Failed to load chunk"))?;
            let Some(content) = doc.get_first(self.content).and_then(|v| v.as_str()) else {
                continue;
            };
            passages.push(Passage {
                content: content.to_string(),
                file_id: doc.get_first(self.file_id).and_then(|v| v.as_i64()),
            });
        }
        Ok(passages)
    }
}

#[async_trait]
impl Retriever for LocalRetriever {
    fn name(&self) -> &str {
        "local"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        if k == 0 || plain_terms(query).trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = query.to_string();
        self.call(move |inner| inner.search(&query, k)).await
    }

    async fn index(&self, file_id: i64, chunks: Vec<String>) -> Result<usize> {
        let chunks: Vec<String> = chunks.into_iter().filter(|c| !c.trim().is_empty()).collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let added = self
            .call(move |inner| {
                inner.write(|writer, inner| {
                    for content in chunks.iter() {
                        writer.add_document(doc!(
                            inner.file_id => file_id,
                            inner.content => content.as_str(),
                        ))?;
                    }
                    Ok(chunks.len())
                })
            })
            .await?;
        tracing::debug!(file_id, added, total = self.len(), "Indexed document chunks");
        Ok(added)
    }

    async fn delete(&self, file_id: i64) -> Result<usize> {
        let removed = self
            .call(move |inner| {
                let term = Term::from_field_i64(inner.file_id, file_id);
                let matching = inner
                    .reader
                    .searcher()
                    .search(&TermQuery::new(term.clone(), IndexRecordOption::Basic), &Count)
                    .map_err(index_error("Failed to count chunks"))?;
                if matching == 0 {
                    return Ok(0);
                }
                inner.write(|writer, _| {
                    writer.delete_term(term);
                    Ok(matching)
                })
            })
            .await?;
        if removed > 0 {
            tracing::debug!(file_id, removed, "Removed document chunks");
        }
        Ok(removed)
    }
}
