//! LLM pool: backend selection, model aliasing and rate-limit retries.
//!
//! Everything above this layer talks to a `ChatModel`: submit role-tagged
//! messages, receive the assistant's text. `LlmPool` is the HTTP-backed
//! implementation; tests substitute scripted models.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{ModelConfig, Provider};
use client::{AnthropicClient, LlmError, OpenAiClient};
use types::{resolve_model, Message};

/// Seconds to wait on a 429 that carries no `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// The one calling convention the rest of the crate depends on.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the running conversation; return the assistant's reply text.
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// Resolved model ID, for logs and artifacts.
    fn model_id(&self) -> &str;

    /// Single-prompt convenience: one user message in, text out.
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        self.chat(&[Message::user(prompt)]).await
    }
}

enum Backend {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

/// LLM connection pool bound to one configured backend and model.
pub struct LlmPool {
    backend: Backend,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    max_retries: u32,
}

impl LlmPool {
    /// Build a pool from configuration, reading the API key from the
    /// environment variable the config names.
    pub fn from_config(config: &ModelConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            LlmError::MissingApiKey(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Build a pool with an explicit API key.
    pub fn with_api_key(config: &ModelConfig, api_key: String) -> Self {
        let backend = match config.provider {
            Provider::OpenAi => Backend::OpenAi(OpenAiClient::new(api_key, config.base_url.clone())),
            Provider::Anthropic => Backend::Anthropic(AnthropicClient::with_base_url(
                api_key,
                config.base_url.clone(),
            )),
        };

        Self {
            backend,
            model: resolve_model(&config.model).to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        }
    }

    async fn send_once(&self, messages: &[Message]) -> Result<String, LlmError> {
        match &self.backend {
            Backend::OpenAi(client) => {
                client
                    .chat(&self.model, messages, Some(self.max_tokens), self.temperature)
                    .await
            }
            Backend::Anthropic(client) => {
                client
                    .chat(&self.model, messages, self.max_tokens, self.temperature)
                    .await
            }
        }
    }
}

#[async_trait]
impl ChatModel for LlmPool {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            debug!(model = %self.model, messages = messages.len(), attempt, "sending chat request");
            match self.send_once(messages).await {
                Err(LlmError::RateLimited { retry_after }) if attempt < self.max_retries => {
                    let wait = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    warn!(model = %self.model, wait, "rate limited, retrying");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
