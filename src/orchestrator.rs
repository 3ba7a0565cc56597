//! Chat request orchestration
//!
//! Drives one chat turn end to end: history, retrieval, prompt assembly,
//! generation and exactly one log write once the stream has ended.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::engine::{GenerationEngine, GenerationRequest, TokenStream};
use crate::error::{DocQaError, Result};
use crate::model::registry::ModelRegistry;
use crate::prompt;
use crate::retrieval::{self, Retriever};
use crate::store::{LogStore, NewLogRecord, TurnStatus};

/// One chat call.
#[derive(Debug, Clone)]
pub struct ChatTurnRequest {
    pub question: String,
    /// Continue this session; a new one is started when absent
    pub session_id: Option<String>,
    pub model: String,
}

/// One streamed fragment of the answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    pub token: String,
    pub session_id: String,
}

/// What happened to a turn, reported after its log write was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub session_id: String,
    pub status: TurnStatus,
    pub response: String,
    /// Id of the written log record; `None` when the write failed
    pub record_id: Option<i64>,
}

/// Resolves once the turn's log write was attempted.
///
/// Yields `None` when already taken or when the driver task was aborted.
pub struct Completion {
    rx: Option<oneshot::Receiver<TurnOutcome>>,
}

impl Future for Completion {
    type Output = Option<TurnOutcome>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };
        let outcome = std::task::ready!(Pin::new(rx).poll(cx));
        this.rx = None;
        Poll::Ready(outcome.ok())
    }
}

/// The streamed answer to one chat call.
///
/// Dropping it before the end cancels generation; the partial turn is
/// still logged, as `cancelled`.
pub struct ChatStream {
    session_id: String,
    events: ReceiverStream<ChatEvent>,
    completion: Option<oneshot::Receiver<TurnOutcome>>,
}

impl ChatStream {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Future resolving to the turn's outcome once it has been logged.
    /// Only the first call gets the outcome.
    pub fn finished(&mut self) -> Completion {
        Completion {
            rx: self.completion.take(),
        }
    }
}

impl Stream for ChatStream {
    type Item = ChatEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}

/// Coordinates retrieval, generation and transcript logging.
pub struct ChatOrchestrator {
    registry: Arc<ModelRegistry>,
    engine: GenerationEngine,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn LogStore>,
    system_prompt: String,
    k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        engine: GenerationEngine,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn LogStore>,
        system_prompt: impl Into<String>,
        k: usize,
    ) -> Self {
        Self {
            registry,
            engine,
            retriever,
            store,
            system_prompt: system_prompt.into(),
            k,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Start one chat turn.
    ///
    /// Every error returned here happens before streaming begins and
    /// leaves nothing logged.
    pub async fn handle(&self, request: ChatTurnRequest) -> Result<ChatStream> {
        if request.question.trim().is_empty() {
            return Err(DocQaError::EmptyQuery);
        }

        let model = self.registry.get(&request.model)?;

        let (session_id, history) = match request.session_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => {
                let history = self.store.history(&id).await.map_err(|e| match e {
                    DocQaError::StoreUnavailable(_) => e,
                    other => DocQaError::StoreUnavailable(other.to_string()),
                })?;
                (id, history)
            }
            None => (uuid::Uuid::new_v4().to_string(), Vec::new()),
        };

        let passages = self
            .retriever
            .retrieve(&request.question, self.k)
            .await
            .map_err(|e| match e {
                DocQaError::RetrievalFailed(_) => e,
                other => DocQaError::RetrievalFailed(other.to_string()),
            })?;
        let context = retrieval::join_passages(&passages);

        tracing::info!(
            session_id = %session_id,
            model = %model.name(),
            history_turns = history.len() / 2,
            passages = passages.len(),
            "Handling chat turn"
        );

        let prompt = prompt::assemble(&self.system_prompt, &history, &context, &request.question);
        let job = self
            .engine
            .start(
                &model,
                GenerationRequest {
                    session_id: session_id.clone(),
                    question: request.question.clone(),
                    prompt,
                    sampling: model.descriptor().sampling.clone(),
                },
            )
            .await?;
        let (tokens, _handle) = job.into_parts();

        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        let turn = Turn {
            store: self.store.clone(),
            record: NewLogRecord {
                session_id: session_id.clone(),
                user_query: request.question,
                response: String::new(),
                system_prompt: self.system_prompt.clone(),
                retrieved_context: context,
                model: model.name().to_string(),
                status: TurnStatus::Complete,
            },
        };
        tokio::spawn(turn.drive(tokens, tx, done_tx));

        Ok(ChatStream {
            session_id,
            events: ReceiverStream::new(rx),
            completion: Some(done_rx),
        })
    }
}

/// Driver state for one in-flight turn.
struct Turn {
    store: Arc<dyn LogStore>,
    record: NewLogRecord,
}

impl Turn {
    async fn drive(
        mut self,
        mut tokens: TokenStream,
        tx: mpsc::Sender<ChatEvent>,
        done: oneshot::Sender<TurnOutcome>,
    ) {
        let session_id = self.record.session_id.clone();

        let status = loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => break TurnStatus::Cancelled,
                next = tokens.next() => next,
            };

            match next {
                None => break TurnStatus::Complete,
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session_id, "Turn ended early: {e}");
                    break TurnStatus::Incomplete;
                }
                Some(Ok(token)) => {
                    let event = ChatEvent {
                        token,
                        session_id: session_id.clone(),
                    };
                    if tx.send(event).await.is_err() {
                        break TurnStatus::Cancelled;
                    }
                }
            }
        };

        // stop generation before logging
        self.record.response = tokens.into_text();
        self.record.status = status;
        let response = self.record.response.clone();

        let record_id = match self.store.append(self.record).await {
            Ok(id) => {
                tracing::info!(
                    session_id = %session_id,
                    status = %status,
                    record_id = id,
                    "Logged chat turn"
                );
                Some(id)
            }
            Err(e) => {
                let e = match e {
                    DocQaError::LogWriteFailed(_) => e,
                    other => DocQaError::LogWriteFailed(other.to_string()),
                };
                tracing::error!(session_id = %session_id, status = %status, "{e}");
                None
            }
        };

        let _ = done.send(TurnOutcome {
            session_id,
            status,
            response,
            record_id,
        });
        // the event stream ends only after the log write
        drop(tx);
    }
}
