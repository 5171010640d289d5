//! Valet runtime — the tool-orchestration core.
//!
//! This crate drives a bounded multi-turn exchange between an LLM and a
//! set of independently connected tool providers:
//!
//! - **ToolRegistry**: merges every provider's tool catalog into one flat
//!   namespace and routes tool calls to their owning provider.
//! - **Session**: the orchestration loop. Alternates between asking the
//!   model and executing the tools it requested, bounded by a maximum
//!   number of tool round trips, appending everything to an append-only
//!   conversation history.
//! - **Backend**: the model API seam, with Gemini and Anthropic
//!   implementations.
//! - **ToolProvider**: the capability interface a connected provider
//!   exposes (`list_tools` / `invoke`), implemented over MCP.
//!
//! One bad tool call never aborts a session: unknown names, transport
//! faults, and provider-reported errors all come back to the model as
//! structured error results.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{GeminiBackend, Session, ToolRegistry};
//! use std::sync::Arc;
//! use storage::EventStore;
//!
//! # async fn example(configs: Vec<mcp::ProviderConfig>) -> runtime::Result<()> {
//! let registry = Arc::new(ToolRegistry::connect(configs).await);
//! let backend = GeminiBackend::new(std::env::var("GEMINI_API_KEY").unwrap(), "gemini-2.5-flash");
//! let store = EventStore::in_memory()?;
//!
//! let mut session = Session::new(store, backend, registry.clone())?;
//! let answer = session.chat("Is there a Domino's near Union Square?").await?;
//! println!("{answer}");
//!
//! session.end()?;
//! registry.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod backend;
mod error;
mod history;
pub mod model;
mod provider;
mod registry;
mod schema;
mod session;

// Model types and backend trait
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolOutcome,
    ToolResult, ToolSpec, Usage,
};

// Backend implementations
pub use backend::{
    AnthropicBackend, AnthropicBackendBuilder, DEFAULT_ANTHROPIC_MODEL, DEFAULT_GEMINI_MODEL,
    GeminiBackend,
};

// Provider capability interface
pub use provider::{McpProvider, ProviderError, ToolDescriptor, ToolOutput, ToolProvider};

// Registry and dispatch
pub use registry::ToolRegistry;

// Schema normalization
pub use schema::normalize;

// Conversation state
pub use history::History;

// Session management
pub use session::{Session, SessionOptions};

// Error types
pub use error::{Error, Result};
