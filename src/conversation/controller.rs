//! The locate loop: model reply → classify → finalize, serve a tool, or ask.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::answers::{AnswerError, AnswerSource};
use super::format::{detect_format, ResponseFormat};
use super::tool_call::{extract_tool_block, ToolCallError, ToolDescriptor, ToolParser};
use super::Conversation;
use crate::llm::client::LlmError;
use crate::llm::ChatModel;
use crate::tools::{FileViewer, ViewError};

/// First JSON array of objects embedded anywhere in a reply.
static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)\[\s*\{\s*"[^"]+"\s*:.*?\}\s*\]"#).unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("no answer to the model's question: {0}")]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    ToolCall(#[from] ToolCallError),

    #[error(transparent)]
    View(#[from] ViewError),
}

/// How a session ended.
#[derive(Debug)]
pub enum Termination {
    /// The model produced a final JSON answer.
    Finalized(Value),
    /// The turn budget ran out first.
    Exhausted { turns: usize },
    Failed(ConversationError),
}

/// What happened on one model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    Question,
    ToolServed(ToolDescriptor),
    ToolFailed(String),
    Finalized,
}

/// Outcome of a locate session plus its full transcript.
#[derive(Debug)]
pub struct Session {
    pub termination: Termination,
    pub conversation: Conversation,
    pub turns: Vec<Turn>,
}

impl Session {
    pub fn result(&self) -> Option<&Value> {
        match &self.termination {
            Termination::Finalized(value) => Some(value),
            _ => None,
        }
    }
}

/// Drives one multi-turn dialogue against a model.
pub struct Controller<'a> {
    model: &'a dyn ChatModel,
    viewer: &'a FileViewer,
    max_turns: Option<usize>,
}

impl<'a> Controller<'a> {
    pub fn new(model: &'a dyn ChatModel, viewer: &'a FileViewer) -> Self {
        Self {
            model,
            viewer,
            max_turns: None,
        }
    }

    /// Limit the number of model replies. `None` = unbounded.
    pub fn with_max_turns(mut self, max_turns: Option<usize>) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Run a session seeded with `prompt` until it terminates.
    pub async fn run(&self, prompt: impl Into<String>, answers: &mut dyn AnswerSource) -> Session {
        let mut conversation = Conversation::seeded(prompt);
        let mut turns = Vec::new();

        let termination = loop {
            if self.max_turns.is_some_and(|max| turns.len() >= max) {
                warn!(turns = turns.len(), "turn budget exhausted without a final answer");
                break Termination::Exhausted { turns: turns.len() };
            }

            info!(turn = turns.len() + 1, model = %self.model.model_id(), "waiting for model reply");
            let reply = match self.model.chat(conversation.messages()).await {
                Ok(reply) => reply,
                Err(e) => break Termination::Failed(e.into()),
            };
            conversation.push_assistant(reply.clone());

            let format = detect_format(&reply);
            debug!(?format, len = reply.len(), "classified reply");

            if format != ResponseFormat::Xml {
                if let Some(result) = extract_json_array(&reply) {
                    info!("model produced a final answer");
                    turns.push(Turn::Finalized);
                    break Termination::Finalized(result);
                }
            }

            if let Some(block) = extract_tool_block(&reply) {
                match self.serve_tool(block) {
                    Ok((descriptor, content)) => {
                        info!(
                            filepath = %descriptor.filepath,
                            filename = %descriptor.filename,
                            bytes = content.len(),
                            "served tool call"
                        );
                        turns.push(Turn::ToolServed(descriptor));
                        conversation.push_user(content);
                    }
                    Err(e) => {
                        warn!(error = %e, "tool call failed");
                        turns.push(Turn::ToolFailed(e.to_string()));
                        conversation.push_user("");
                    }
                }
                continue;
            }

            match answers.answer(&reply).await {
                Ok(answer) => {
                    turns.push(Turn::Question);
                    conversation.push_user(answer);
                }
                Err(e) => break Termination::Failed(e.into()),
            }
        };

        Session {
            termination,
            conversation,
            turns,
        }
    }

    fn serve_tool(&self, block: &str) -> Result<(ToolDescriptor, String), ConversationError> {
        let mut parser = ToolParser::new(block);
        parser.parse()?;
        let descriptor = parser
            .into_tool_info()
            .ok_or_else(|| ToolCallError::Invalid("parser produced no tool info".into()))?;
        let content = self.viewer.read(&descriptor)?;
        Ok((descriptor, content))
    }
}

/// Best-effort extraction of the final JSON array from a reply.
///
/// Tries the first array-of-objects match; if that does not parse and the
/// reply itself starts with `[`, tries the span from the first `[` to the
/// last `]`.
pub fn extract_json_array(reply: &str) -> Option<Value> {
    let found = JSON_ARRAY.find(reply)?;
    match serde_json::from_str(found.as_str().trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "embedded JSON array did not parse");
            let trimmed = reply.trim();
            if !trimmed.starts_with('[') {
                return None;
            }
            let start = trimmed.find('[')?;
            let end = trimmed.rfind(']')?;
            serde_json::from_str(&trimmed[start..=end]).ok()
        }
    }
}
