//! Chat orchestration integration tests
//!
//! Drives full chat turns through the orchestrator with scripted backends,
//! a fixed retriever and the in-memory store. Covers delta delivery, log
//! writes, session history, request validation, cancellation and
//! concurrent sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use docqa::backend::types::{BackendOutput, BackendStream, ChatMessage, ChatRequest, Role};
use docqa::backend::Backend;
use docqa::model::descriptor::{BackendKind, SamplingParams};
use docqa::retrieval::LocalRetriever;
use docqa::store::{DocumentRecord, LogRecord, MemoryStore, NewLogRecord, SessionSummary};
use docqa::{
    ChatEvent, ChatOrchestrator, ChatTurnRequest, DocQaError, GenerationEngine, LogStore,
    ModelDescriptor, ModelHandle, ModelRegistry, Passage, Result, Retriever, TurnStatus,
};

// ─── Fakes ───────────────────────────────────────────────────────

/// Replays a fixed script and records every request it receives.
struct ScriptedBackend {
    script: Vec<Result<BackendOutput>>,
    delay: Duration,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(script: Vec<Result<BackendOutput>>) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn deltas(pieces: &[&str]) -> Self {
        Self::new(
            pieces
                .iter()
                .map(|p| Ok(BackendOutput::Delta(p.to_string())))
                .collect(),
        )
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn last_messages(&self) -> Vec<ChatMessage> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.messages.clone())
            .unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn load(&self, _: &ModelDescriptor) -> Result<()> {
        Ok(())
    }

    async fn chat(&self, _: &ModelDescriptor, request: ChatRequest) -> Result<BackendStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        let script: Vec<Result<BackendOutput>> = self
            .script
            .iter()
            .map(|item| match item {
                Ok(output) => Ok(output.clone()),
                Err(e) => Err(DocQaError::GenerationFailed(e.to_string())),
            })
            .collect();
        let delay = self.delay;
        let stream = futures::stream::iter(script).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }
}

/// Always returns the same passages, whatever the question.
struct FixedRetriever {
    passages: Vec<String>,
}

#[async_trait]
impl Retriever for FixedRetriever {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn retrieve(&self, _: &str, k: usize) -> Result<Vec<Passage>> {
        Ok(self.passages.iter().take(k).map(Passage::new).collect())
    }

    async fn index(&self, _: i64, chunks: Vec<String>) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn delete(&self, _: i64) -> Result<usize> {
        Ok(0)
    }
}

struct DownRetriever;

#[async_trait]
impl Retriever for DownRetriever {
    fn name(&self) -> &str {
        "down"
    }

    async fn retrieve(&self, _: &str, _: usize) -> Result<Vec<Passage>> {
        Err(DocQaError::RetrievalFailed("vector index offline".to_string()))
    }

    async fn index(&self, _: i64, _: Vec<String>) -> Result<usize> {
        Ok(0)
    }

    async fn delete(&self, _: i64) -> Result<usize> {
        Ok(0)
    }
}

/// Reads work; every log append fails.
#[derive(Default)]
struct ReadOnlyStore {
    inner: MemoryStore,
    appends: AtomicUsize,
}

impl ReadOnlyStore {
    fn appends(&self) -> usize {
        self.appends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogStore for ReadOnlyStore {
    async fn append(&self, _: NewLogRecord) -> Result<i64> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(DocQaError::LogWriteFailed("database is locked".to_string()))
    }

    async fn records(&self, session_id: &str) -> Result<Vec<LogRecord>> {
        self.inner.records(session_id).await
    }

    async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.inner.sessions().await
    }

    async fn delete_session(&self, session_id: &str) -> Result<usize> {
        self.inner.delete_session(session_id).await
    }

    async fn insert_document(&self, filename: &str) -> Result<DocumentRecord> {
        self.inner.insert_document(filename).await
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        self.inner.get_document(id).await
    }

    async fn delete_document(&self, id: i64) -> Result<bool> {
        self.inner.delete_document(id).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.inner.list_documents().await
    }
}

fn descriptor(name: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        backend: BackendKind::Echo,
        model_id: name.to_string(),
        base_url: None,
        gpu_memory_utilization: 0.9,
        tensor_parallel_size: 1,
        max_model_len: 101_000,
        max_num_seqs: 8,
        sampling: SamplingParams::default(),
    }
}

fn orchestrator(
    backends: Vec<(&str, Arc<ScriptedBackend>)>,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn LogStore>,
) -> ChatOrchestrator {
    let handles = backends
        .into_iter()
        .map(|(name, backend)| ModelHandle::new(descriptor(name), backend as Arc<dyn Backend>))
        .collect();
    ChatOrchestrator::new(
        Arc::new(ModelRegistry::from_handles(handles).unwrap()),
        GenerationEngine::new(4),
        retriever,
        store,
        "You are a helpful AI assistant.",
        2,
    )
}

fn fixed(passages: &[&str]) -> Arc<dyn Retriever> {
    Arc::new(FixedRetriever {
        passages: passages.iter().map(|p| p.to_string()).collect(),
    })
}

fn ask(question: &str, session_id: Option<&str>, model: &str) -> ChatTurnRequest {
    ChatTurnRequest {
        question: question.to_string(),
        session_id: session_id.map(str::to_string),
        model: model.to_string(),
    }
}

fn concat(events: &[ChatEvent]) -> String {
    events.iter().map(|e| e.token.as_str()).collect()
}

// ─── End to end ──────────────────────────────────────────────────

#[tokio::test]
async fn test_new_session_end_to_end() {
    let backend = Arc::new(ScriptedBackend::new(
        ["X", "X is", "X is a", "X is a thing."]
            .iter()
            .map(|s| Ok(BackendOutput::Cumulative(s.to_string())))
            .collect(),
    ));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        vec![("llama3.3", backend.clone())],
        fixed(&["X is a thing."]),
        store.clone(),
    );

    let mut stream = orch.handle(ask("What is X?", None, "llama3.3")).await.unwrap();
    let session_id = stream.session_id().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());
    let completion = stream.finished();

    let events: Vec<ChatEvent> = stream.collect().await;
    let tokens: Vec<&str> = events.iter().map(|e| e.token.as_str()).collect();
    assert_eq!(tokens, vec!["X", " is", " a", " thing."]);
    assert!(events.iter().all(|e| e.session_id == session_id));

    let messages = backend.last_messages();
    let last = messages.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last
        .content
        .contains("### Context: X is a thing.\n### User's question: What is X?"));

    let outcome = completion.await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Complete);
    let records = store.records(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].response, "X is a thing.");
    assert_eq!(records[0].user_query, "What is X?");
    assert_eq!(records[0].retrieved_context, "X is a thing.");
    assert_eq!(records[0].model, "llama3.3");
    assert_eq!(outcome.record_id, Some(records[0].id));
}

#[tokio::test]
async fn test_deltas_concatenate_to_logged_response() {
    let pieces = ["The", " borrow", " checker", "", " enforces", " ownership", "."];
    let backend = Arc::new(ScriptedBackend::deltas(&pieces));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend)], fixed(&["ctx"]), store.clone());

    let mut stream = orch.handle(ask("q", None, "m")).await.unwrap();
    let session_id = stream.session_id().to_string();
    let completion = stream.finished();
    let events: Vec<ChatEvent> = stream.collect().await;
    completion.await.unwrap();

    assert_eq!(events.len(), 6, "empty deltas are not emitted");
    let text = concat(&events);
    assert_eq!(text, pieces.concat());

    let records = store.records(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].response, text);
}

// ─── Logging ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_mid_stream_failure_logs_partial_once() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Ok(BackendOutput::Delta("Partial".to_string())),
        Ok(BackendOutput::Delta(" answer".to_string())),
        Err(DocQaError::GenerationFailed("CUDA out of memory".to_string())),
        Ok(BackendOutput::Delta(" never".to_string())),
    ]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend)], fixed(&["ctx"]), store.clone());

    let mut stream = orch.handle(ask("q", None, "m")).await.unwrap();
    let session_id = stream.session_id().to_string();
    let completion = stream.finished();
    let events: Vec<ChatEvent> = stream.collect().await;
    assert_eq!(concat(&events), "Partial answer");

    let outcome = completion.await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Incomplete);

    let records = store.records(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, TurnStatus::Incomplete);
    assert_eq!(records[0].response, "Partial answer");
}

#[tokio::test]
async fn test_dropped_stream_logs_cancelled_turn() {
    let script = (0..1000)
        .map(|i| Ok(BackendOutput::Delta(format!("t{i} "))))
        .collect();
    let backend = Arc::new(ScriptedBackend::new(script).with_delay(Duration::from_millis(5)));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend)], fixed(&["ctx"]), store.clone());

    let mut stream = orch.handle(ask("q", None, "m")).await.unwrap();
    let session_id = stream.session_id().to_string();
    let completion = stream.finished();

    let first = stream.next().await.unwrap();
    assert_eq!(first.token, "t0 ");
    drop(stream);

    let outcome = tokio::time::timeout(Duration::from_secs(2), completion)
        .await
        .expect("turn finishes after disconnect")
        .unwrap();
    assert_eq!(outcome.status, TurnStatus::Cancelled);

    let records = store.records(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, TurnStatus::Cancelled);
    assert!(records[0].response.starts_with("t0 "));
    assert!(records[0].response.len() < 1000 * 4);
}

#[tokio::test]
async fn test_log_write_failure_still_delivers_answer() {
    let backend = Arc::new(ScriptedBackend::deltas(&["X", " is", " a", " thing."]));
    let store = Arc::new(ReadOnlyStore::default());
    let orch = orchestrator(vec![("m", backend)], fixed(&["ctx"]), store.clone());

    let mut stream = orch.handle(ask("What is X?", None, "m")).await.unwrap();
    let completion = stream.finished();
    let events: Vec<ChatEvent> = stream.collect().await;
    assert_eq!(events.len(), 4);
    assert_eq!(concat(&events), "X is a thing.");

    let outcome = completion.await.unwrap();
    assert_eq!(outcome.status, TurnStatus::Complete);
    assert_eq!(outcome.response, "X is a thing.");
    assert_eq!(outcome.record_id, None);
    assert_eq!(store.appends(), 1);
}

// ─── Sessions ────────────────────────────────────────────────────

#[tokio::test]
async fn test_session_history_in_prompt() {
    let backend = Arc::new(ScriptedBackend::deltas(&["answer"]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend.clone())], fixed(&["ctx"]), store.clone());

    let mut session_id: Option<String> = None;
    for (k, question) in ["first?", "second?", "third?"].iter().enumerate() {
        let mut stream = orch
            .handle(ask(question, session_id.as_deref(), "m"))
            .await
            .unwrap();
        if let Some(id) = &session_id {
            assert_eq!(stream.session_id(), id);
        }
        session_id = Some(stream.session_id().to_string());
        let completion = stream.finished();
        let _: Vec<ChatEvent> = stream.collect().await;
        completion.await.unwrap();

        let messages = backend.last_messages();
        assert_eq!(messages.len(), 2 + 2 * k);
        assert_eq!(messages[0].role, Role::System);
        for turn in 0..k {
            let prior = ["first?", "second?", "third?"][turn];
            assert_eq!(messages[1 + 2 * turn], ChatMessage::user(prior));
            assert_eq!(messages[2 + 2 * turn], ChatMessage::assistant("answer"));
        }
        assert!(messages.last().unwrap().content.contains(question));
    }

    let records = store.records(session_id.as_deref().unwrap()).await.unwrap();
    assert_eq!(records.len(), 3);
}

// ─── Validation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_query_has_no_side_effects() {
    let backend = Arc::new(ScriptedBackend::deltas(&["x"]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend.clone())], fixed(&["ctx"]), store.clone());

    for question in ["", "   ", "\n\t"] {
        let result = orch.handle(ask(question, None, "m")).await;
        assert!(matches!(result, Err(DocQaError::EmptyQuery)));
    }
    assert_eq!(backend.calls(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_unknown_model_lists_available() {
    let a = Arc::new(ScriptedBackend::deltas(&["x"]));
    let b = Arc::new(ScriptedBackend::deltas(&["y"]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(
        vec![("qwen", a.clone()), ("llama3.3", b.clone())],
        fixed(&["ctx"]),
        store.clone(),
    );

    let err = orch
        .handle(ask("What is X?", None, "gpt-4"))
        .await
        .err()
        .unwrap();
    match &err {
        DocQaError::ModelNotFound { name, available } => {
            assert_eq!(name, "gpt-4");
            assert_eq!(available, &vec!["llama3.3".to_string(), "qwen".to_string()]);
        }
        other => panic!("expected ModelNotFound, got {other:?}"),
    }
    assert!(err.to_string().contains("llama3.3, qwen"));
    assert_eq!(a.calls() + b.calls(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_retrieval_failure_is_pre_stream() {
    let backend = Arc::new(ScriptedBackend::deltas(&["x"]));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(vec![("m", backend.clone())], Arc::new(DownRetriever), store.clone());

    let result = orch.handle(ask("q", None, "m")).await;
    assert!(matches!(result, Err(DocQaError::RetrievalFailed(_))));
    assert_eq!(backend.calls(), 0);
    assert!(store.is_empty().await);
}

// ─── Concurrency ─────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let alpha: Vec<&str> = vec!["alpha", " one", " two", " three"];
    let beta: Vec<&str> = vec!["beta", " uno", " dos", " tres", " cuatro"];
    let a = Arc::new(ScriptedBackend::deltas(&alpha).with_delay(Duration::from_millis(3)));
    let b = Arc::new(ScriptedBackend::deltas(&beta).with_delay(Duration::from_millis(2)));
    let store = Arc::new(MemoryStore::new());
    let orch = Arc::new(orchestrator(
        vec![("a", a), ("b", b)],
        fixed(&["shared context"]),
        store.clone(),
    ));

    let run = |model: &'static str, session: &'static str| {
        let orch = orch.clone();
        tokio::spawn(async move {
            let mut stream = orch.handle(ask("q", Some(session), model)).await.unwrap();
            let completion = stream.finished();
            let events: Vec<ChatEvent> = stream.collect().await;
            completion.await.unwrap();
            assert!(events.iter().all(|e| e.session_id == session));
            concat(&events)
        })
    };

    let (text_a, text_b) = tokio::join!(run("a", "session-a"), run("b", "session-b"));
    let (text_a, text_b) = (text_a.unwrap(), text_b.unwrap());
    assert_eq!(text_a, alpha.concat());
    assert_eq!(text_b, beta.concat());

    let records_a = store.records("session-a").await.unwrap();
    let records_b = store.records("session-b").await.unwrap();
    assert_eq!(records_a.len(), 1);
    assert_eq!(records_b.len(), 1);
    assert_eq!(records_a[0].response, text_a);
    assert_eq!(records_b[0].response, text_b);
    assert_eq!(records_a[0].model, "a");
    assert_eq!(records_b[0].model, "b");
}

// ─── Documents ───────────────────────────────────────────────────

#[tokio::test]
async fn test_uploaded_document_feeds_retrieval() {
    use docqa::documents::DocumentService;
    use docqa::retrieval::TextChunker;

    let backend = Arc::new(ScriptedBackend::deltas(&["ok"]));
    let store = Arc::new(MemoryStore::new());
    let retriever = Arc::new(LocalRetriever::in_memory().unwrap());
    let docs = DocumentService::new(store.clone(), retriever.clone(), TextChunker::default());
    let orch = orchestrator(vec![("m", backend.clone())], retriever, store.clone());

    let record = docs
        .upload("facts.txt", b"Ferris is the Rust mascot.")
        .await
        .unwrap();

    let mut stream = orch.handle(ask("Who is Ferris?", None, "m")).await.unwrap();
    let completion = stream.finished();
    let _: Vec<ChatEvent> = stream.collect().await;
    completion.await.unwrap();
    assert!(backend
        .last_messages()
        .last()
        .unwrap()
        .content
        .contains("### Context: Ferris is the Rust mascot."));

    docs.delete(record.id).await.unwrap();
    let mut stream = orch.handle(ask("Who is Ferris?", None, "m")).await.unwrap();
    let completion = stream.finished();
    let _: Vec<ChatEvent> = stream.collect().await;
    let outcome = completion.await.unwrap();
    let records = store.records(&outcome.session_id).await.unwrap();
    assert_eq!(records[0].retrieved_context, "");
}
