//! Tool-provider process management (spawn, communicate, lifecycle).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};

/// Default timeout for provider requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum response line size (1MB).
/// Sized for large tool outputs (PDF extractions, menu listings).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Connection target for a tool provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

/// Handle to a running tool-provider process.
///
/// One provider is one child process speaking line-delimited JSON-RPC on
/// stdio. All requests go through a single request/response channel; the
/// stdin and stdout locks serialize concurrent callers.
pub struct Provider {
    config: ProviderConfig,
    process: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
    next_id: AtomicI64,
    initialized: Mutex<bool>,
    tools: Mutex<Vec<Tool>>,
}

impl Provider {
    /// Spawn a provider process.
    pub async fn spawn(config: ProviderConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        Ok(Self {
            config,
            process: Mutex::new(process),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            next_id: AtomicI64::new(1),
            initialized: Mutex::new(false),
            tools: Mutex::new(Vec::new()),
        })
    }

    /// Get the provider name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Initialize the provider (must be called before other operations).
    pub async fn initialize(&self) -> Result<&Self> {
        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;

        // Send initialized notification
        self.notify("notifications/initialized", None::<()>).await?;

        *self.initialized.lock().await = true;

        self.refresh_tools().await?;

        let tools = self.tools.lock().await;
        info!(
            provider = %self.config.name,
            server = %result.server_info.name,
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "connected to tool provider"
        );

        Ok(self)
    }

    /// Check if the provider is initialized.
    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Refresh the tool catalog.
    ///
    /// Each catalog entry is validated individually; malformed entries are
    /// skipped with a warning so one bad tool never hides the rest of a
    /// provider's catalog.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        *self.tools.lock().await = parse_catalog(&self.config.name, result.tools);
        Ok(())
    }

    /// Get the cached tool catalog.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.lock().await.clone()
    }

    /// Call a tool by name.
    ///
    /// Returns the provider's result envelope as-is: a result with
    /// `is_error` set is still `Ok` here. Only transport and protocol
    /// faults surface as `Err`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResult> {
        if !*self.initialized.lock().await {
            return Err(Error::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        self.request("tools/call", Some(params)).await
    }

    /// Check if the provider process is still running.
    pub async fn is_running(&self) -> bool {
        let mut process = self.process.lock().await;
        matches!(process.try_wait(), Ok(None))
    }

    /// Close the connection and terminate the provider process.
    pub async fn close(&self) {
        // Shutdown notification is best effort; the process may already be gone
        let _ = self.notify("shutdown", None::<()>).await;

        let mut process = self.process.lock().await;
        let _ = process.kill().await;
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        // Send request
        let request_json = serde_json::to_string(&request)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(request_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        // Read response with timeout
        let response = timeout(DEFAULT_TIMEOUT, self.read_response())
            .await
            .map_err(|_| Error::Timeout)??;

        // Verify response ID matches
        if response.id != id {
            return Err(Error::InvalidResponse(format!(
                "response ID mismatch: expected {id:?}, got {:?}",
                response.id
            )));
        }

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)?;

        Ok(result)
    }

    async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<()>
    where
        P: serde::Serialize,
    {
        // Notifications have no ID
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params.and_then(|p| serde_json::to_value(p).ok())
        });

        let notification_json = serde_json::to_string(&notification)?;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.write_all(notification_json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await?;
        }

        Ok(())
    }

    async fn read_response(&self) -> Result<JsonRpcResponse> {
        let mut stdout = self.stdout.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(Error::ProviderExited);
            }

            if line.len() > MAX_OUTPUT_SIZE {
                return Err(Error::OutputTooLarge {
                    size: line.len(),
                    max: MAX_OUTPUT_SIZE,
                });
            }

            // Providers may interleave notifications (no id) with responses;
            // skip anything that is not a response to a request.
            match serde_json::from_str::<JsonRpcResponse>(&line) {
                Ok(response) => return Ok(response),
                Err(_) => {
                    if serde_json::from_str::<serde_json::Value>(&line)
                        .map(|v| v.get("method").is_some())
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    return Err(Error::InvalidResponse(line.trim().to_string()));
                }
            }
        }
    }
}

/// Validate catalog entries one by one, skipping malformed ones.
fn parse_catalog(provider: &str, entries: Vec<serde_json::Value>) -> Vec<Tool> {
    let mut tools = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Tool>(entry) {
            Ok(tool) => tools.push(tool),
            Err(e) => {
                warn!(provider = %provider, error = %e, "skipping malformed catalog entry");
            }
        }
    }
    tools
}
