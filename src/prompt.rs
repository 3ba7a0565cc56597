//! Prompt assembly
//!
//! Builds the message sequence for one generation call. Pure and
//! deterministic: identical inputs produce byte-identical prompts.

use serde::Serialize;

use crate::backend::types::{ChatMessage, Role};

const CONTEXT_MARKER: &str = "### Context: ";
const QUESTION_MARKER: &str = "\n### User's question: ";

/// Ordered messages sent to a model for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    /// The synthesized user turn carrying context and question.
    pub fn final_turn(&self) -> Option<&ChatMessage> {
        self.messages.last().filter(|m| m.role == Role::User)
    }

    /// Prior conversation turns, without the system turn and the final user turn.
    pub fn history(&self) -> &[ChatMessage] {
        let start = usize::from(
            self.messages
                .first()
                .is_some_and(|m| m.role == Role::System),
        );
        let end = self.messages.len().saturating_sub(1).max(start);
        &self.messages[start..end]
    }
}

/// Render the question template with retrieved context.
pub fn render_question(context: &str, question: &str) -> String {
    format!(
        "Answer the question below from the following context:\n{CONTEXT_MARKER}{context}{QUESTION_MARKER}{question}\n"
    )
}

/// Recover the context section from a rendered question, if present.
pub fn extract_context(content: &str) -> Option<&str> {
    let start = content.find(CONTEXT_MARKER)? + CONTEXT_MARKER.len();
    let end = content[start..].rfind(QUESTION_MARKER)? + start;
    Some(&content[start..end])
}

/// System turn first, then the full history in order, then the rendered question.
pub fn assemble(
    system_prompt: &str,
    history: &[ChatMessage],
    retrieved_context: &str,
    question: &str,
) -> Prompt {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(render_question(retrieved_context, question)));
    Prompt { messages }
}
