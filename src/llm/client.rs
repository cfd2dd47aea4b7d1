//! ChatModel trait and the OpenAI chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::turn::{Role, ToolCall, Turn};

/// Black-box conversational model.
///
/// Both methods are fallible and never retried by this crate; a failure
/// aborts the in-flight workflow turn.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Continue the conversation. The returned assistant turn may carry
    /// pending tool call requests.
    async fn generate(&self, turns: &[Turn]) -> Result<Turn>;

    /// Single-shot instruction-following call; returns the raw text.
    async fn instruct(&self, prompt: &str) -> Result<String>;
}

/// A tool advertised to the model so it can request invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool arguments
    pub parameters: Value,
}

/// Configuration for the OpenAI client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key
    pub api_key: String,
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: String,
    /// Base URL override
    pub base_url: Option<String>,
    /// Sampling temperature; near-zero keeps judgments stable
    pub temperature: f64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            temperature: 0.01,
            timeout_secs: 120,
        }
    }

    /// Read `OPENAI_API_KEY` and `OPENAI_MODEL` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
        let model = env::var("OPENAI_MODEL")
            .map_err(|_| Error::Config("OPENAI_MODEL is not set".to_string()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// OpenAI chat-completions client.
pub struct OpenAiClient {
    config: ClientConfig,
    tools: Vec<ToolDefinition>,
    http: Client,
}

impl OpenAiClient {
    const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(config: ClientConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            config,
            tools: Vec::new(),
            http,
        }
    }

    /// Advertise tools to the model so assistant turns can request them.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE_URL)
    }

    async fn chat(&self, messages: Vec<ApiMessage>, with_tools: bool) -> Result<ApiChoiceMessage> {
        let tools: Vec<ApiTool> = if with_tools {
            self.tools
                .iter()
                .map(|tool| ApiTool {
                    tool_type: "function".to_string(),
                    function: tool.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let api_request = ApiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let url = format!("{}/v1/chat/completions", self.base_url());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::collaborator("openai", format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::collaborator("openai", format!("failed to read response: {e}")))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorEnvelope>(&body) {
                return Err(Error::collaborator(
                    "openai",
                    format!("API error ({}): {}", error.error.error_type, error.error.message),
                ));
            }
            return Err(Error::collaborator(
                "openai",
                format!("API error ({status}): {body}"),
            ));
        }

        let api_response: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| Error::collaborator("openai", format!("failed to parse response: {e}")))?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| Error::collaborator("openai", "response contained no choices"))
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn generate(&self, turns: &[Turn]) -> Result<Turn> {
        let messages = turns.iter().map(ApiMessage::from_turn).collect();
        let message = self.chat(messages, true).await?;

        let mut tool_calls = Vec::new();
        for call in message.tool_calls.unwrap_or_default() {
            let arguments: Value = serde_json::from_str(&call.function.arguments)
                .map_err(|e| {
                    Error::collaborator("openai", format!("malformed tool arguments: {e}"))
                })?;
            tool_calls.push(ToolCall::new(call.id, call.function.name, arguments));
        }

        Ok(Turn::assistant(message.content.unwrap_or_default()).with_tool_calls(tool_calls))
    }

    async fn instruct(&self, prompt: &str) -> Result<String> {
        let messages = vec![ApiMessage {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }];
        let message = self.chat(messages, false).await?;
        Ok(message.content.unwrap_or_default())
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ToolDefinition,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn from_turn(turn: &Turn) -> Self {
        let tool_calls = if turn.tool_calls.is_empty() {
            None
        } else {
            Some(
                turn.tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        id: call.id.clone(),
                        call_type: "function".to_string(),
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        Self {
            role: match turn.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
                Role::Tool => "tool".to_string(),
            },
            content: Some(turn.content.clone()),
            tool_calls,
            tool_call_id: turn.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: ApiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    /// JSON-encoded argument object
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}
