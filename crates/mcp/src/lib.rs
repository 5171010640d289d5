//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with tool providers via
//! stdio. A provider is an independent child process exposing a tool
//! catalog (`tools/list`) and a call operation (`tools/call`) over
//! line-delimited JSON-RPC 2.0.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{Provider, ProviderConfig};
//! use std::collections::HashMap;
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ProviderConfig {
//!     name: "pizza".to_string(),
//!     command: "python".to_string(),
//!     args: vec!["mcp_servers/pizza_server.py".to_string()],
//!     env: HashMap::new(),
//! };
//!
//! let provider = Provider::spawn(config).await?;
//! provider.initialize().await?;
//!
//! for tool in provider.tools().await {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = provider.call_tool("search_menu", Some(serde_json::json!({
//!     "query": "pepperoni"
//! }))).await?;
//! println!("{}", result.text());
//!
//! provider.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod provider;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ProviderInfo, RequestId, Tool, ToolContent,
};
pub use provider::{DEFAULT_TIMEOUT, MAX_OUTPUT_SIZE, Provider, ProviderConfig};
