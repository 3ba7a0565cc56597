use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::descriptor::SamplingParams;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request for chat-based inference against one model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

/// Text reported by a backend while it generates.
///
/// Some runtimes report the new fragment only, others report everything
/// generated so far on every callback; the engine normalizes both into deltas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutput {
    /// Only the newly generated fragment
    Delta(String),
    /// The full text generated so far
    Cumulative(String),
}

/// Finite stream of outputs for one chat request. Dropping it stops generation.
pub type BackendStream = Pin<Box<dyn Stream<Item = Result<BackendOutput>> + Send>>;
