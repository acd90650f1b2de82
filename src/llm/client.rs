//! Raw HTTP clients for the chat backends.
//!
//! No conversation awareness; it only makes API calls via reqwest.

use reqwest::{Client, Response};
use tracing::debug;

use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, Message, MessagesRequest, MessagesResponse,
    Role,
};

/// Errors from LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
/// (BigModel GLM, DeepSeek, OpenAI).
#[derive(Debug)]
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send the conversation and return the first choice's text.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model,
            messages,
            max_tokens,
            temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let resp: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        resp.text()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("response carried no message content".into()))
    }
}

/// Raw HTTP client for the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl AnthropicClient {
    /// Create a client with default base URL (https://api.anthropic.com).
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, "https://api.anthropic.com".into())
    }

    /// Create a client with a custom base URL (for testing with mock servers).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: "2023-06-01".into(),
        }
    }

    /// Send the conversation and return the first text block.
    ///
    /// System-role messages are lifted into the request's `system` field;
    /// the Messages API only accepts user/assistant turns.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        let request = build_messages_request(model, messages, max_tokens, temperature);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        if let Some(usage) = &resp.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = resp.stop_reason.as_deref().unwrap_or("-"),
                "anthropic reply"
            );
        }
        resp.text()
            .ok_or_else(|| LlmError::InvalidResponse("response carried no text block".into()))
    }
}

fn build_messages_request(
    model: &str,
    messages: &[Message],
    max_tokens: u32,
    temperature: Option<f32>,
) -> MessagesRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    MessagesRequest {
        model: model.to_string(),
        max_tokens,
        messages: messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect(),
        system: if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        },
        temperature,
    }
}

/// Map 429 and 4xx/5xx statuses to typed errors.
async fn check_status(response: Response) -> Result<Response, LlmError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(LlmError::RateLimited { retry_after });
    }

    if status >= 400 {
        let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
        return Err(LlmError::ApiError {
            status,
            message: body,
        });
    }

    Ok(response)
}
