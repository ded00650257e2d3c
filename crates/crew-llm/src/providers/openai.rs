//! OpenAI chat-completions provider
//!
//! Works against api.openai.com and any endpoint speaking the same protocol
//! (Azure deployments, LM Studio, vLLM, ...). Tool calls use the
//! `tools`/`tool_calls` function-calling format.
//!
//! ```no_run
//! use crew_llm::{CompletionRequest, LLMProvider, Message};
//! use crew_llm::providers::{OpenAIConfig, OpenAIProvider};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAIProvider::with_config(
//!     OpenAIConfig::new("sk-...").with_api_base("http://localhost:1234/v1"),
//! )?;
//!
//! let request = CompletionRequest::builder("gpt-3.5-turbo")
//!     .add_message(Message::user("Summarize today's AAPL news"))
//!     .build();
//! let response = provider.complete(request).await?;
//! println!("{}", response.message.text());
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, InferenceError, LLMProvider, Message,
    MessageContent, Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use crew_utils::EnvSource;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variables accepted for the API key, in lookup order
pub const API_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "OPEN_API_KEY"];

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,

    /// Base URL, without the trailing `/chat/completions`
    pub api_base: String,

    /// Per-request HTTP timeout in seconds
    pub timeout_secs: u64,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read the key from `OPENAI_API_KEY` (or the legacy `OPEN_API_KEY`) and
    /// the optional base URL from `OPENAI_API_BASE`
    pub fn from_env(env: &impl EnvSource) -> Result<Self> {
        let api_key = env
            .required(API_KEY_VARS)
            .map_err(|e| InferenceError::ConfigurationError(e.to_string()))?;

        let mut config = Self::new(api_key);
        if let Some(base) = env.first_of(&["OPENAI_API_BASE"]) {
            config = config.with_api_base(base);
        }
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// OpenAI provider
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::ConfigurationError(
                "API key must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let body = build_request(request);
        let model = body.model.clone();
        debug!(messages = body.messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 | 403 => InferenceError::AuthenticationFailed,
                429 => InferenceError::RateLimitExceeded(error_text),
                400 => InferenceError::InvalidRequest(error_text),
                404 => InferenceError::ModelNotFound(model),
                _ => InferenceError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            InferenceError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let usage = parsed.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::UnexpectedResponse("No choices in response".into()))?;

        debug!(
            finish_reason = choice.finish_reason.as_deref().unwrap_or("none"),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Received chat completion"
        );

        let stop_reason = map_stop_reason(choice.finish_reason.as_deref());
        let message = parse_response_message(choice.message)?;

        Ok(CompletionResponse {
            message,
            stop_reason,
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: String) -> Self {
        Self {
            role,
            content: Some(content),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    tool_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API sends them
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// Conversions

fn build_request(request: CompletionRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = request.system {
        messages.push(WireMessage::text("system", system));
    }
    for message in request.messages {
        messages.extend(convert_message(message));
    }

    ChatRequest {
        model: request.model,
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        tools: request.tools.iter().map(convert_tool).collect(),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

/// One of our messages may expand into several wire messages: tool results
/// each become their own `role: "tool"` message.
fn convert_message(message: Message) -> Vec<WireMessage> {
    let role = role_name(message.role);
    let blocks = match message.content {
        MessageContent::Text(text) => return vec![WireMessage::text(role, text)],
        MessageContent::Blocks(blocks) => blocks,
    };

    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut results = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(WireToolCall {
                id,
                tool_type: function_type(),
                function: WireFunctionCall {
                    name,
                    arguments: input.to_string(),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => results.push(WireMessage {
                role: "tool",
                content: Some(content),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_use_id),
            }),
        }
    }

    let mut out = Vec::with_capacity(results.len() + 1);
    if !texts.is_empty() || !tool_calls.is_empty() {
        out.push(WireMessage {
            role,
            content: (!texts.is_empty()).then(|| texts.join("\n")),
            tool_calls,
            tool_call_id: None,
        });
    }
    out.extend(results);
    out
}

fn convert_tool(tool: &ToolDefinition) -> WireTool {
    WireTool {
        tool_type: "function",
        function: WireFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        },
    }
}

fn parse_response_message(message: ResponseMessage) -> Result<Message> {
    let mut blocks = Vec::new();

    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::Text { text });
    }

    for call in message.tool_calls {
        let arguments = if call.function.arguments.trim().is_empty() {
            "{}"
        } else {
            call.function.arguments.as_str()
        };
        let input: serde_json::Value = serde_json::from_str(arguments).map_err(|e| {
            InferenceError::UnexpectedResponse(format!(
                "Failed to parse arguments for tool '{}': {e}",
                call.function.name
            ))
        })?;

        blocks.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    Ok(Message::assistant_blocks(blocks))
}

fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("stop") | None => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls" | "function_call") => StopReason::ToolUse,
        Some("content_filter") => StopReason::ContentFilter,
        Some(other) => {
            warn!(reason = other, "Unknown finish reason, treating as end of turn");
            StopReason::EndTurn
        }
    }
}
