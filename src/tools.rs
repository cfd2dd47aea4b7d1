//! Tool execution: the trait the controller dispatches on, and the
//! Tavily web-search binding used as the default retrieval tool.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::llm::ToolDefinition;

/// Black-box tool execution. The returned text becomes the content of a
/// tool turn tagged with the originating call id.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name the model addresses invocations to.
    fn name(&self) -> &str;

    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments.
    async fn invoke(&self, arguments: &Value) -> Result<String>;
}

/// Web search tool backed by the Tavily API.
pub struct SearchTool {
    api_key: String,
    base_url: String,
    max_results: u32,
    http: Client,
}

impl SearchTool {
    const NAME: &'static str = "web_search";
    const DEFAULT_BASE_URL: &'static str = "https://api.tavily.com";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            max_results: 3,
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Read `TAVILY_API_KEY` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TAVILY_API_KEY")
            .map_err(|_| Error::Config("TAVILY_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: "Search the web for current information. \
                          Returns the most relevant results for a query."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn invoke(&self, arguments: &Value) -> Result<String> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::collaborator(Self::NAME, "missing 'query' argument"))?;

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
        };

        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::collaborator(Self::NAME, format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::collaborator(Self::NAME, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            return Err(Error::collaborator(
                Self::NAME,
                format!("API error ({status}): {body}"),
            ));
        }

        let parsed: SearchResponse = serde_json::from_str(&body).map_err(|e| {
            Error::collaborator(Self::NAME, format!("failed to parse response: {e}"))
        })?;

        // One result per line so downstream statement extraction sees
        // clean boundaries.
        let lines: Vec<String> = parsed
            .results
            .iter()
            .map(|result| format!("{} ({}): {}", result.title, result.url, result.content))
            .collect();

        Ok(lines.join("\n"))
    }
}
