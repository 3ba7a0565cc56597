// In-process backend that answers extractively: it replies with the retrieved
// context found in the final user turn, one word at a time.
//
// It runs on a blocking worker and reports cumulative text on every step, the
// same shape as local runtimes that expose a callback with the text so far.
// This keeps the service usable without an accelerator and gives tests a
// deterministic backend.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{DocQaError, Result};
use crate::model::descriptor::ModelDescriptor;
use crate::prompt;

use super::types::{BackendOutput, BackendStream, ChatRequest, Role};
use super::Backend;

const NO_CONTEXT_ANSWER: &str = "I could not find an answer in the provided documents.";

pub struct EchoBackend;

impl EchoBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EchoBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<()> {
        tracing::info!(
            model = %descriptor.name,
            max_model_len = descriptor.max_model_len,
            "Loaded model with echo backend"
        );
        Ok(())
    }

    async fn chat(
        &self,
        descriptor: &ModelDescriptor,
        request: ChatRequest,
    ) -> Result<BackendStream> {
        let prompt_tokens: usize = request
            .messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum();
        if prompt_tokens > descriptor.max_model_len {
            return Err(DocQaError::GenerationFailed(format!(
                "prompt of {prompt_tokens} tokens exceeds max_model_len {}",
                descriptor.max_model_len
            )));
        }

        let answer = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| prompt::extract_context(&m.content))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(NO_CONTEXT_ANSWER)
            .to_string();
        let max_tokens = request.sampling.max_tokens as usize;

        let (tx, rx) = mpsc::channel(8);
        tokio::task::spawn_blocking(move || {
            let mut text = String::new();
            for piece in split_pieces(&answer).into_iter().take(max_tokens) {
                text.push_str(piece);
                if tx
                    .blocking_send(Ok(BackendOutput::Cumulative(text.clone())))
                    .is_err()
                {
                    // receiver dropped: job cancelled
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Split text into word pieces, each carrying the whitespace that precedes it.
/// Concatenating the pieces gives back `text`.
pub fn split_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut prev_whitespace = false;

    for (i, c) in text.char_indices() {
        let whitespace = c.is_whitespace();
        if prev_whitespace && !whitespace && i > 0 {
            let piece_start = text[..i]
                .char_indices()
                .rev()
                .take_while(|(_, ch)| ch.is_whitespace())
                .last()
                .map(|(idx, _)| idx)
                .unwrap_or(i);
            if piece_start > start {
                pieces.push(&text[start..piece_start]);
                start = piece_start;
            }
        }
        prev_whitespace = whitespace;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
