//! # rigor-core
//!
//! A rigor-enforcing conversational workflow: per user turn, decide
//! whether the answer must be grounded in retrieved facts, extract
//! atomic fact statements from tool output, verify the draft answer's
//! claims against those facts, and emit a revised, fact-restricted
//! answer when verification fails.
//!
//! ## Core Components
//!
//! - **Turn / Session**: conversation history and the entry point
//! - **Parse**: statement segmentation and boolean judgment parsing
//! - **FactStore**: extracted facts keyed by source-turn identity
//! - **RigorController**: the Draft → Judge → Collect → Validate →
//!   Revise state machine
//!
//! ## Example
//!
//! ```rust,ignore
//! use rigor_core::{ClientConfig, OpenAiClient, RigorController, SearchTool, Session};
//! use std::sync::Arc;
//!
//! let search = Arc::new(SearchTool::from_env()?);
//! let model = OpenAiClient::new(ClientConfig::from_env()?)
//!     .with_tools(vec![search.definition()]);
//!
//! let controller = RigorController::new(Arc::new(model)).with_tool(search);
//! let mut session = Session::new(controller);
//!
//! let reply = session.send("How tall is the Eiffel Tower?").await?;
//! println!("{}", reply.content);
//! ```
//!
//! This crate is a verification *filter*, not a knowledge base: it
//! guarantees only that the final answer's claims are not contradicted
//! by the evidence gathered during the turn.

pub mod controller;
pub mod error;
pub mod facts;
pub mod llm;
pub mod parse;
pub mod prompt;
pub mod session;
pub mod state;
pub mod tools;
pub mod turn;

// Re-exports for convenience
pub use controller::{ControllerConfig, RigorController, REFUSAL, REVISION_REQUEST};
pub use error::{Error, Result};
pub use facts::FactStore;
pub use llm::{ChatModel, ClientConfig, OpenAiClient, ToolDefinition};
pub use parse::{first_sentence, segment_statements, BooleanParser, Statement};
pub use prompt::{bulleted_paragraph, Instruction};
pub use session::Session;
pub use state::{MergeStrategy, RigorState, StateField, StateUpdate};
pub use tools::{SearchTool, Tool};
pub use turn::{find_last_turn, Role, ToolCall, Turn};
