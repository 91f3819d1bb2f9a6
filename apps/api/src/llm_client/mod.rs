/// LLM Client: the single point of entry for all model calls in HireFlow.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Everything else depends on the `LanguageModel` trait so tests can script replies.
///
/// Model: claude-sonnet-4-5 (hardcoded)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in HireFlow.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 2048;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is not configured")]
    Unavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One conversation turn handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a call site hands the model: a system persona, the task instructions,
/// the conversation, and whether the reply must be JSON.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub messages: &'a [ChatMessage],
    pub json_mode: bool,
}

/// What came back. In JSON mode an unparsable body is returned as `Text` so that
/// repair prompts can see exactly what the model produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    Json(Value),
}

impl ModelReply {
    pub fn into_json(self) -> Option<Value> {
        match self {
            ModelReply::Json(v) => Some(v),
            ModelReply::Text(_) => None,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ModelReply::Text(t) => t,
            ModelReply::Json(v) => v.to_string(),
        }
    }
}

/// The language-model capability. Every call site must tolerate `Err` and malformed shapes.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, LlmError>;
}

/// Asks for JSON and returns it only if the model produced parsable JSON.
pub async fn ask_json(
    llm: &dyn LanguageModel,
    system: &str,
    prompt: &str,
    messages: &[ChatMessage],
) -> Option<Value> {
    let request = CompletionRequest {
        system,
        prompt,
        messages,
        json_mode: true,
    };
    match llm.complete(request).await {
        Ok(ModelReply::Json(v)) => Some(v),
        Ok(ModelReply::Text(raw)) => {
            warn!("Model returned non-JSON content in JSON mode ({} chars)", raw.len());
            None
        }
        Err(e) => {
            warn!("Model call failed: {e}");
            None
        }
    }
}

/// Asks for free text. Empty replies count as failures.
pub async fn ask_text(
    llm: &dyn LanguageModel,
    system: &str,
    prompt: &str,
    messages: &[ChatMessage],
) -> Option<String> {
    let request = CompletionRequest {
        system,
        prompt,
        messages,
        json_mode: false,
    };
    match llm.complete(request).await {
        Ok(reply) => {
            let text = reply.into_text().trim().to_string();
            (!text.is_empty()).then_some(text)
        }
        Err(e) => {
            warn!("Model call failed: {e}");
            None
        }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The production model client.
/// Wraps the Anthropic Messages API with retry logic. Without an API key every call
/// returns `LlmError::Unavailable` immediately, which sends callers down their fallbacks.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(api_key: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn call(&self, request: &CompletionRequest<'_>) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::Unavailable)?;
        let request_body = build_request(request);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelReply, LlmError> {
        let response = self.call(&request).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        Ok(interpret_reply(text, request.json_mode))
    }
}

/// Folds the task prompt into the system prompt and keeps only the turns the Messages API
/// accepts: non-empty content, starting with a user turn. With no usable turns the prompt
/// itself becomes the single user message.
fn build_request<'a>(request: &'a CompletionRequest<'a>) -> AnthropicRequest<'a> {
    let mut messages: Vec<AnthropicMessage<'a>> = request
        .messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .skip_while(|m| m.role != "user")
        .map(|m| AnthropicMessage {
            role: if m.role == "assistant" { "assistant" } else { "user" },
            content: m.content.as_str(),
        })
        .collect();

    let mut system = request.system.to_string();
    if messages.is_empty() {
        messages.push(AnthropicMessage {
            role: "user",
            content: request.prompt,
        });
    } else if !request.prompt.is_empty() {
        system.push_str("\n\n");
        system.push_str(request.prompt);
    }
    if request.json_mode {
        system.push_str("\n\n");
        system.push_str(prompts::JSON_ONLY_SYSTEM);
    }

    AnthropicRequest {
        model: MODEL,
        max_tokens: MAX_TOKENS,
        system,
        messages,
    }
}

fn interpret_reply(text: &str, json_mode: bool) -> ModelReply {
    if !json_mode {
        return ModelReply::Text(text.to_string());
    }
    match serde_json::from_str::<Value>(strip_json_fences(text)) {
        Ok(value) => ModelReply::Json(value),
        Err(_) => ModelReply::Text(text.to_string()),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
