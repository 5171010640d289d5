//! Tool-provider capability interface.

use async_trait::async_trait;
use serde_json::Value;

/// Error type for provider operations.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// A tool as described by its provider, before normalization.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Raw result envelope of a tool invocation.
///
/// `is_error` marks a business failure (the tool ran, the operation did
/// not succeed); transport and protocol faults are the `Err` path of
/// [`ToolProvider::invoke`] instead.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub is_error: bool,
    pub content: String,
}

/// Capability interface of a connected tool provider.
///
/// The registry stores these as `Arc<dyn ToolProvider>`, so heterogeneous
/// provider implementations (and test stubs) share one seam. This is the
/// boundary between the orchestration loop and side effects.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name, used for logging and event attribution.
    fn name(&self) -> &str;

    /// Report the provider's tool catalog.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError>;

    /// Invoke a tool with the given arguments.
    async fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput, ProviderError>;

    /// Release the provider's resources.
    async fn close(&self);
}

/// Tool provider backed by an MCP server process.
pub struct McpProvider {
    inner: mcp::Provider,
}

impl McpProvider {
    /// Spawn the provider process and complete the MCP handshake.
    pub async fn connect(config: mcp::ProviderConfig) -> Result<Self, ProviderError> {
        let inner = mcp::Provider::spawn(config).await?;
        inner.initialize().await?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl ToolProvider for McpProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ProviderError> {
        Ok(self
            .inner
            .tools()
            .await
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description.unwrap_or_default(),
                input_schema: tool.input_schema,
            })
            .collect())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<ToolOutput, ProviderError> {
        let arguments = if arguments.is_null() {
            None
        } else {
            Some(arguments)
        };
        let result = self.inner.call_tool(name, arguments).await?;
        Ok(ToolOutput {
            is_error: result.is_error,
            content: result.text(),
        })
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
