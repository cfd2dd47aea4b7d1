//! Conversation data model: Role, ToolCall, Turn.
//!
//! A [`Turn`] is one message in a conversation. Turns are immutable once
//! created; the session holds an append-only, order-preserving sequence
//! of them. Tool-originated turns carry a stable identity used as the
//! fact-store key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// User/human input
    User,
    /// Assistant/model response
    Assistant,
    /// Tool execution result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model in an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier assigned by the model; the resulting tool turn
    /// echoes it back so results can be matched to requests.
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Tool arguments as a JSON object
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Stable turn identity
    pub id: String,
    /// Role of the message sender
    pub role: Role,
    /// Literal text content
    pub content: String,
    /// Tool invocations requested by this turn (assistant turns only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool turns, the id of the originating [`ToolCall`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// When the turn was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Turn {
    /// Create a new turn with a fresh id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result turn tagged with the originating call id.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::Tool, content);
        turn.tool_call_id = Some(tool_call_id.into());
        turn
    }

    /// Attach tool call requests to an assistant turn.
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Whether this turn requests any tool invocations.
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Whether the content is empty after trimming.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Scan a turn sequence backward for the last non-empty turn with the
/// given role.
pub fn find_last_turn(turns: &[Turn], role: Role) -> Option<&Turn> {
    turns
        .iter()
        .rev()
        .find(|turn| turn.role == role && !turn.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_constructors() {
        let turn = Turn::user("Hello");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Hello");
        assert!(turn.tool_calls.is_empty());
        assert!(turn.tool_call_id.is_none());
        assert!(!turn.id.is_empty());
    }

    #[test]
    fn test_tool_turn_carries_call_id() {
        let turn = Turn::tool("result text", "call_42");
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_42"));
    }

    #[test]
    fn test_requests_tools() {
        let plain = Turn::assistant("done");
        assert!(!plain.requests_tools());

        let calling = Turn::assistant("").with_tool_calls(vec![ToolCall::new(
            "call_1",
            "web_search",
            serde_json::json!({"query": "rust"}),
        )]);
        assert!(calling.requests_tools());
    }

    #[test]
    fn test_find_last_turn_skips_empty() {
        let turns = vec![
            Turn::user("question"),
            Turn::assistant("first answer"),
            Turn::assistant("   "),
        ];
        let found = find_last_turn(&turns, Role::Assistant).unwrap();
        assert_eq!(found.content, "first answer");
    }

    #[test]
    fn test_find_last_turn_none() {
        let turns = vec![Turn::user("question")];
        assert!(find_last_turn(&turns, Role::Assistant).is_none());
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let a = Turn::user("x");
        let b = Turn::user("x");
        assert_ne!(a.id, b.id);
    }
}
