//! Chat model abstraction and the OpenAI-backed implementation.
//!
//! The workflow core treats model generation as a black box behind the
//! [`ChatModel`] trait: one call that continues a conversation (and may
//! request tool invocations), and one single-shot instruction call used
//! by the judging, extraction, validation, and summarization stages.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rigor_core::llm::{ChatModel, ClientConfig, OpenAiClient};
//! use rigor_core::Turn;
//!
//! let client = OpenAiClient::new(ClientConfig::from_env()?);
//! let reply = client.generate(&[Turn::user("Hello")]).await?;
//! ```

mod client;

pub use client::{ChatModel, ClientConfig, OpenAiClient, ToolDefinition};
