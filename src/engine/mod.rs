//! Streaming generation engine
//!
//! Runs one generation job per request against a shared model handle. Each
//! job is a spawned producer task that pulls backend outputs, reduces them
//! to deltas and pushes them through a bounded channel to the job's
//! [`TokenStream`]. Jobs share nothing but the model handle.

pub mod delta;
pub mod stream;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::types::{BackendStream, ChatRequest, Role};
use crate::error::{DocQaError, Result};
use crate::model::descriptor::SamplingParams;
use crate::model::registry::ModelHandle;
use crate::prompt::Prompt;

pub use delta::DeltaCursor;
pub use stream::TokenStream;

/// Everything needed to run one generation job.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub session_id: String,
    /// The raw user question, before templating
    pub question: String,
    pub prompt: Prompt,
    pub sampling: SamplingParams,
}

/// Cancels a running job. Cloneable; cancelling twice is a no-op.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: String,
    token: CancellationToken,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop the job: the backend stream is dropped and the model slot released.
    /// Deltas already delivered stay delivered.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A live generation job.
pub struct GenerationJob {
    pub stream: TokenStream,
    pub handle: JobHandle,
}

impl GenerationJob {
    pub fn into_parts(self) -> (TokenStream, JobHandle) {
        (self.stream, self.handle)
    }
}

/// Starts generation jobs.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    buffer: usize,
}

impl GenerationEngine {
    /// `buffer` bounds each job's delta channel; a stalled consumer
    /// back-pressures the producer instead of growing memory.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
        }
    }

    /// Start one job on `model`.
    ///
    /// Waits for a free slot on the model, then opens the backend stream.
    /// Failures up to that point are returned here; later failures arrive
    /// as an error item on the job's stream.
    pub async fn start(&self, model: &ModelHandle, request: GenerationRequest) -> Result<GenerationJob> {
        if request.question.trim().is_empty() {
            return Err(DocQaError::EmptyQuery);
        }
        if request.prompt.final_turn().map(|m| m.role) != Some(Role::User) {
            return Err(DocQaError::GenerationFailed(
                "prompt must end with a user turn".to_string(),
            ));
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let permit = model.acquire_slot().await?;

        tracing::debug!(
            job_id = %job_id,
            session_id = %request.session_id,
            model = %model.name(),
            messages = request.prompt.messages.len(),
            "Starting generation job"
        );

        let backend_stream = model
            .backend()
            .chat(
                model.descriptor(),
                ChatRequest {
                    messages: request.prompt.messages,
                    sampling: request.sampling,
                },
            )
            .await?;

        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.buffer);

        let producer_token = token.clone();
        let producer_job_id = job_id.clone();
        tokio::spawn(async move {
            // held until the producer exits
            let _permit = permit;
            produce(backend_stream, tx, producer_token, &producer_job_id).await;
        });

        Ok(GenerationJob {
            stream: TokenStream::new(rx, token.clone().drop_guard()),
            handle: JobHandle { id: job_id, token },
        })
    }
}

async fn produce(
    mut backend: BackendStream,
    tx: mpsc::Sender<Result<String>>,
    token: CancellationToken,
    job_id: &str,
) {
    let mut cursor = DeltaCursor::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(job_id, emitted = cursor.emitted().len(), "Generation job cancelled");
                return;
            }
            next = backend.next() => next,
        };

        let item = match next {
            None => {
                tracing::debug!(job_id, emitted = cursor.emitted().len(), "Generation job finished");
                return;
            }
            Some(Ok(output)) => match cursor.advance(output) {
                Ok(Some(delta)) => Ok(delta),
                Ok(None) => continue,
                Err(e) => Err(e),
            },
            Some(Err(e)) => Err(e),
        };

        let failed = item.is_err();
        if let Err(e) = &item {
            tracing::warn!(job_id, emitted = cursor.emitted().len(), "Generation failed: {e}");
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            sent = tx.send(item) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        if failed {
            return;
        }
    }
}
