//! Configuration loading from purser.toml.

use mcp::ServerConfig;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "purser.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Tool dispatch settings.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// MCP servers to launch, in prompt order.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

/// Which model API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[default]
    Deepseek,
    Openai,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::Deepseek => runtime::DEEPSEEK_MODEL,
            Provider::Openai => "gpt-4o",
        }
    }

    /// Environment variable consulted when no key is configured.
    pub fn key_env(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Deepseek => "DEEPSEEK_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
        }
    }

    /// Base URL for the OpenAI-compatible providers.
    pub fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::Anthropic => None,
            Provider::Deepseek => Some(runtime::DEEPSEEK_BASE_URL),
            Provider::Openai => Some("https://api.openai.com/v1"),
        }
    }
}

/// Backend provider configuration.
#[derive(Debug, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub provider: Provider,

    /// Model to use. Defaults per provider.
    pub model: Option<String>,

    /// Override the API endpoint (OpenAI-compatible providers only).
    pub base_url: Option<String>,

    /// API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,

    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,

    pub max_tokens: Option<u32>,
}

/// Tool dispatch settings.
#[derive(Debug, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    runtime::DEFAULT_TOOL_TIMEOUT.as_secs()
}

/// One MCP server to launch.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment; values may reference `${VAR}`.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::Invalid("tools.timeout_secs must be positive".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::Invalid("server name must not be empty".into()));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate server name '{}'",
                    server.name
                )));
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.backend
            .model
            .as_deref()
            .unwrap_or_else(|| self.backend.provider.default_model())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tools.timeout_secs)
    }

    /// Resolve the API key from the process environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolve the API key: the configured key, then `api_key_env`, then
    /// the provider's conventional variable.
    pub fn api_key_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        if let Some(key) = &self.backend.api_key {
            return Ok(key.clone());
        }
        let var = self
            .backend
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| self.backend.provider.key_env());
        env(var)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(var.to_string()))
    }

    /// Launch configs for every server, with `${VAR}` expanded from the
    /// process environment.
    pub fn server_configs(&self) -> Vec<ServerConfig> {
        self.server_configs_with(|name| std::env::var(name).ok())
    }

    pub fn server_configs_with(&self, env: impl Fn(&str) -> Option<String>) -> Vec<ServerConfig> {
        self.servers
            .iter()
            .map(|entry| ServerConfig {
                name: entry.name.clone(),
                command: entry.command.clone(),
                args: entry.args.clone(),
                env: entry
                    .env
                    .iter()
                    .map(|(key, value)| (key.clone(), expand_vars(value, &env)))
                    .collect::<HashMap<_, _>>(),
            })
            .collect()
    }
}

/// Replace each `${NAME}` with the variable's value, or nothing when unset.
/// An unterminated `${` is kept as written.
pub fn expand_vars(value: &str, env: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&env(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("API key not configured: set backend.api_key or the {0} environment variable")]
    MissingApiKey(String),
}
