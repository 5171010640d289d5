//! Tool registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use mcp::ProviderConfig;
use tracing::{error, info, warn};

use crate::model::{ToolCall, ToolResult, ToolSpec};
use crate::provider::{McpProvider, ToolProvider};
use crate::schema::normalize;

/// Merged tool namespace across all connected providers.
///
/// Built once during the connection phase and read-only afterwards. Holds
/// every provider handle for the lifetime of the process; handles are
/// released in reverse-acquisition order by [`ToolRegistry::shutdown`].
#[derive(Default)]
pub struct ToolRegistry {
    /// Providers in acquisition order.
    providers: Vec<Arc<dyn ToolProvider>>,
    /// Tool name to owning provider.
    tools: HashMap<String, Arc<dyn ToolProvider>>,
    /// Model-facing declarations, schemas already normalized.
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured provider and build the merged registry.
    ///
    /// A provider that fails to connect is logged and omitted; the
    /// registry is built from whatever connected.
    pub async fn connect(configs: Vec<ProviderConfig>) -> Self {
        let mut registry = Self::new();
        for config in configs {
            let name = config.name.clone();
            match McpProvider::connect(config).await {
                Ok(provider) => registry.register_provider(Arc::new(provider)).await,
                Err(e) => {
                    warn!(provider = %name, error = %e, "failed to connect to provider; continuing without it");
                }
            }
        }
        registry
    }

    /// Query a provider's catalog and merge it into the namespace.
    ///
    /// On catalog failure the provider contributes no tools but its handle
    /// is still held, so teardown covers every acquired connection. A
    /// colliding tool name is overwritten: the later-registered provider
    /// wins, deterministically.
    pub async fn register_provider(&mut self, provider: Arc<dyn ToolProvider>) {
        match provider.list_tools().await {
            Ok(descriptors) => {
                for descriptor in descriptors {
                    let spec = ToolSpec {
                        name: descriptor.name.clone(),
                        description: descriptor.description,
                        schema: normalize(&descriptor.input_schema),
                    };
                    if let Some(previous) =
                        self.tools.insert(descriptor.name.clone(), provider.clone())
                    {
                        warn!(
                            tool = %descriptor.name,
                            previous = %previous.name(),
                            provider = %provider.name(),
                            "tool name collision; later registration wins"
                        );
                        if let Some(existing) =
                            self.specs.iter_mut().find(|s| s.name == descriptor.name)
                        {
                            *existing = spec;
                        }
                    } else {
                        self.specs.push(spec);
                    }
                }
            }
            Err(e) => {
                warn!(provider = %provider.name(), error = %e, "failed to list tools; provider skipped");
            }
        }
        self.providers.push(provider);
    }

    /// Look up the provider owning a tool name.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn ToolProvider>> {
        self.tools.get(name)
    }

    /// Model-facing tool declarations.
    pub fn declarations(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Provider names with the tools each one owns in the merged
    /// namespace (collisions already resolved).
    pub fn provider_catalog(&self) -> Vec<(String, Vec<String>)> {
        self.providers
            .iter()
            .map(|provider| {
                let mut owned: Vec<String> = self
                    .tools
                    .iter()
                    .filter(|(_, owner)| Arc::ptr_eq(owner, provider))
                    .map(|(name, _)| name.clone())
                    .collect();
                owned.sort();
                (provider.name().to_string(), owned)
            })
            .collect()
    }

    /// Number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Route a tool call to its owning provider.
    ///
    /// Never fails: an unknown name, a provider fault, and a
    /// provider-reported error all come back as an error result for the
    /// model to react to. Fault and business error differ only in how
    /// they are logged.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let Some(provider) = self.resolve(&call.name) else {
            warn!(tool = %call.name, "model requested unknown tool");
            return ToolResult::error(&call.id, &call.name, format!("unknown tool: {}", call.name));
        };

        info!(
            tool = %call.name,
            provider = %provider.name(),
            arguments = %call.arguments,
            "invoking tool"
        );

        match provider.invoke(&call.name, call.arguments.clone()).await {
            Ok(output) if output.is_error => {
                warn!(tool = %call.name, error = %output.content, "tool reported an error");
                ToolResult::error(&call.id, &call.name, output.content)
            }
            Ok(output) => {
                info!(tool = %call.name, chars = output.content.len(), "tool succeeded");
                ToolResult::success(&call.id, &call.name, output.content)
            }
            Err(e) => {
                error!(tool = %call.name, error = %e, "tool invocation failed");
                ToolResult::error(
                    &call.id,
                    &call.name,
                    format!("tool invocation failed: {e}"),
                )
            }
        }
    }

    /// Close every provider connection, newest first.
    pub async fn shutdown(&self) {
        for provider in self.providers.iter().rev() {
            info!(provider = %provider.name(), "closing provider");
            provider.close().await;
        }
    }
}
