// OpenAI-compatible HTTP backend.
//
// Talks to any server exposing `/v1/models` and streaming
// `/v1/chat/completions` (vLLM, llama.cpp server, TGI). The server owns
// batching and accelerator memory; this side only streams deltas.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;

use crate::error::{DocQaError, Result};
use crate::model::descriptor::ModelDescriptor;

use super::types::{BackendOutput, BackendStream, ChatRequest};
use super::Backend;

pub struct OpenAiBackend {
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new() -> Self {
        Self::with_client(
            reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        )
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize base URL by stripping trailing `/` and `/v1`.
fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim_end_matches('/')
        .trim_end_matches("/v1")
        .trim_end_matches('/')
        .to_string()
}

fn base_url(descriptor: &ModelDescriptor) -> Result<String> {
    descriptor
        .base_url
        .as_deref()
        .map(normalize_base_url)
        .ok_or_else(|| {
            DocQaError::Config(format!("model '{}' has no base_url", descriptor.name))
        })
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<()> {
        let url = format!("{}/v1/models", base_url(descriptor)?);
        let response = self.client.get(&url).send().await.map_err(|e| {
            DocQaError::BackendNotAvailable(format!(
                "model '{}': cannot reach {url}: {e}",
                descriptor.name
            ))
        })?;
        if !response.status().is_success() {
            return Err(DocQaError::BackendNotAvailable(format!(
                "model '{}': {url} returned {}",
                descriptor.name,
                response.status()
            )));
        }

        let models: ModelList = response.json().await.map_err(|e| {
            DocQaError::BackendNotAvailable(format!(
                "model '{}': invalid model list from {url}: {e}",
                descriptor.name
            ))
        })?;
        if !models.data.iter().any(|m| m.id == descriptor.model_id) {
            return Err(DocQaError::BackendNotAvailable(format!(
                "model '{}': server at {url} does not serve '{}'",
                descriptor.name, descriptor.model_id
            )));
        }

        tracing::info!(
            model = %descriptor.name,
            model_id = %descriptor.model_id,
            url = %url,
            "Loaded model with openai backend"
        );
        Ok(())
    }

    async fn chat(
        &self,
        descriptor: &ModelDescriptor,
        request: ChatRequest,
    ) -> Result<BackendStream> {
        let url = format!("{}/v1/chat/completions", base_url(descriptor)?);
        let body = serde_json::json!({
            "model": descriptor.model_id,
            "messages": request.messages,
            "stream": true,
            "max_tokens": request.sampling.max_tokens,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
            "repetition_penalty": request.sampling.repetition_penalty,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocQaError::GenerationFailed(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DocQaError::GenerationFailed(format!(
                "{url} returned {status}: {text}"
            )));
        }

        let state = SseState {
            bytes: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.decoder.push(&chunk);
                        while let Some(data) = state.decoder.next_event() {
                            match parse_event(&data) {
                                Ok(SseEvent::Delta(text)) => {
                                    state.pending.push_back(Ok(BackendOutput::Delta(text)))
                                }
                                Ok(SseEvent::Skip) => {}
                                Ok(SseEvent::Done) => {
                                    state.done = true;
                                    break;
                                }
                                Err(e) => {
                                    state.pending.push_back(Err(e));
                                    state.done = true;
                                    break;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.pending.push_back(Err(DocQaError::GenerationFailed(format!(
                            "stream interrupted: {e}"
                        ))));
                        state.done = true;
                    }
                    None => state.done = true,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

type ByteStream = std::pin::Pin<Box<dyn futures::Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct SseState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<BackendOutput>>,
    done: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Skip,
    Done,
}

fn parse_event(data: &str) -> Result<SseEvent> {
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        DocQaError::GenerationFailed(format!("malformed stream chunk: {e}"))
    })?;
    if let Some(error) = chunk.error {
        return Err(DocQaError::GenerationFailed(format!("backend error: {error}")));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .filter(|c| !c.is_empty())
        .map(SseEvent::Delta)
        .unwrap_or(SseEvent::Skip))
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Buffers raw bytes so multi-byte characters split across network chunks
/// are decoded only once the whole event has arrived.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Pop the `data` payload of the next complete event, if any.
    pub fn next_event(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.windows(2).position(|w| w == b"\n\n")?;
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);

            let data: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|d| d.strip_prefix(' ').unwrap_or(d))
                .collect();
            if !data.is_empty() {
                return Some(data.join("\n"));
            }
        }
    }
}
