//! Configuration loading from valet.toml.

use mcp::ProviderConfig;
use runtime::SessionOptions;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Orchestration-loop settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Tool providers, in connection order. Declaration order decides
    /// tool-name collision precedence and teardown order.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

/// Which model API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Gemini,
    Anthropic,
}

/// Model backend configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    /// Backend kind ("gemini" or "anthropic").
    #[serde(default)]
    pub kind: BackendKind,

    /// Model to use; defaults per backend kind.
    pub model: Option<String>,

    /// Environment variable holding the API key; defaults per backend
    /// kind. Keys live in the environment (or `.env`), never in config.
    pub api_key_env: Option<String>,
}

impl BackendConfig {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.kind {
            BackendKind::Gemini => runtime::DEFAULT_GEMINI_MODEL,
            BackendKind::Anthropic => runtime::DEFAULT_ANTHROPIC_MODEL,
        })
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(match self.kind {
            BackendKind::Gemini => "GEMINI_API_KEY",
            BackendKind::Anthropic => "ANTHROPIC_API_KEY",
        })
    }
}

/// Orchestration-loop settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_tool_turns: usize,
    pub initial_temperature: f32,
    pub continuation_temperature: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = SessionOptions::default();
        Self {
            max_tool_turns: defaults.max_tool_turns,
            initial_temperature: defaults.initial_temperature,
            continuation_temperature: defaults.continuation_temperature,
        }
    }
}

impl SessionConfig {
    pub fn to_options(&self) -> SessionOptions {
        SessionOptions {
            max_tool_turns: self.max_tool_turns,
            initial_temperature: self.initial_temperature,
            continuation_temperature: self.continuation_temperature,
        }
    }
}

/// One tool-provider connection target.
#[derive(Debug, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ProviderEntry {
    pub fn to_provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            name: self.name.clone(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [backend]
            kind = "gemini"
            model = "gemini-2.5-flash"

            [session]
            max_tool_turns = 5

            [[providers]]
            name = "pizza"
            command = "python"
            args = ["mcp_servers/pizza_server.py"]

            [[providers]]
            name = "pdf"
            command = "python"
            args = ["mcp_servers/pdf_server.py"]
            env = { PDF_CACHE = "/tmp/pdf" }
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.kind, BackendKind::Gemini);
        assert_eq!(config.session.max_tool_turns, 5);
        // declaration order is connection order
        assert_eq!(config.providers[0].name, "pizza");
        assert_eq!(config.providers[1].name, "pdf");
        assert_eq!(config.providers[1].env["PDF_CACHE"], "/tmp/pdf");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.kind, BackendKind::Gemini);
        assert_eq!(config.backend.model(), runtime::DEFAULT_GEMINI_MODEL);
        assert_eq!(config.backend.api_key_env(), "GEMINI_API_KEY");
        assert_eq!(config.session.max_tool_turns, 10);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn anthropic_backend_defaults() {
        let config = Config::parse("[backend]\nkind = \"anthropic\"\n").unwrap();
        assert_eq!(config.backend.kind, BackendKind::Anthropic);
        assert_eq!(config.backend.model(), runtime::DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.backend.api_key_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn session_temperatures_round_trip() {
        let config = Config::parse(
            "[session]\ninitial_temperature = 0.2\ncontinuation_temperature = 0.7\n",
        )
        .unwrap();
        let options = config.session.to_options();
        assert_eq!(options.initial_temperature, 0.2);
        assert_eq!(options.continuation_temperature, 0.7);
        assert_eq!(options.max_tool_turns, 10);
    }
}
