//! Multi-turn locate dialogue.
//!
//! A session is seeded with one user prompt and then alternates model
//! replies with follow-up user messages until the model produces a final
//! JSON answer, the turn budget runs out, or something fails.
//!
//! - `format` classifies each reply (JSON / XML / text)
//! - `tool_call` parses `<tool>` markup into a `ToolDescriptor`
//! - `controller` drives the loop
//! - `answers` supplies replies to the model's questions

pub mod answers;
pub mod controller;
pub mod format;
pub mod tool_call;
pub mod xml;

pub use answers::{AnswerError, AnswerSource, FixedAnswer, StdinAnswers};
pub use controller::{Controller, ConversationError, Session, Termination, Turn};
pub use format::{detect_format, ResponseFormat};
pub use tool_call::{ToolCallError, ToolDescriptor, ToolParser};

use crate::llm::types::{Message, Role};

/// Ordered, append-only message history. Doubles as the audit transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation holding only the seed prompt.
    pub fn seeded(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message from the given role.
    pub fn last_from(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }
}
