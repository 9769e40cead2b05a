// OpenAI-compatible chat completions client with function calling


use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use super::{ChatMessage, ChatModel, CompletionRequest, ToolDefinition};
use crate::config::{Config, ConfigError};
use crate::http::{HttpError, JsonHttpClient, normalize_base_url};
use crate::{RagError, Result};

/// Client for any endpoint that speaks `POST {base}/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    endpoint: Url,
    http: JsonHttpClient,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl OpenAiChatModel {
    /// Build a client from the `llm` section; needs `LLM_BASE_URL` and `GEMINI_API_KEY`
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let (base_url, _model, api_key) = config.llm.require()?;
        Self::with_endpoint(base_url, api_key, Duration::from_secs(config.http.timeout_seconds))
            .map(|client| client.with_retry_attempts(config.http.retry_attempts))
    }

    #[inline]
    pub fn with_endpoint(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let endpoint = normalize_base_url(base_url)
            .and_then(|base| base.join("chat/completions"))
            .map_err(|_| ConfigError::InvalidUrl(base_url.to_string()))?;

        let http = JsonHttpClient::new(timeout)
            .with_header("Authorization", &format!("Bearer {}", api_key));

        Ok(Self { endpoint, http })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ChatMessage> {
        let tools: Vec<WireTool<'_>> = request
            .tools
            .iter()
            .map(|function| WireTool {
                kind: "function",
                function,
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        let body = WireRequest {
            model: request.model,
            messages: request.messages,
            tools,
            tool_choice,
        };

        debug!(
            "Requesting completion from {} with {} messages",
            request.model,
            request.messages.len()
        );

        let response: WireResponse = self
            .http
            .post(&self.endpoint, &body)
            .await
            .map_err(completion_error)?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Agent("Completion response had no choices".to_string()))?;

        debug!(
            "Completion finished ({}) with {} tool calls",
            choice.finish_reason.as_deref().unwrap_or("unknown"),
            choice.message.tool_calls.len()
        );
        Ok(choice.message)
    }
}

fn completion_error(err: HttpError) -> RagError {
    error!("Chat completion request failed: {}", err);
    match err {
        HttpError::Transport { .. } | HttpError::Join(_) => RagError::Network(err.to_string()),
        _ => RagError::Agent(err.to_string()),
    }
}
