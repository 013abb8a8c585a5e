//! Configuration loading, validation, and secret resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level Agent Trail configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarizer: Option<SummarizerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Hosted agent-run service configuration.
///
/// The run endpoint is `{base_url}/{app_id}/run`; the API key is sent as a
/// bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Released-app API root (default: the hosted Wordware endpoint).
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// Released-app identifier to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Semver constraint sent with each run request.
    #[serde(default = "default_upstream_version")]
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

fn default_upstream_base_url() -> String {
    "https://app.wordware.ai/api/released-app".into()
}

fn default_upstream_version() -> String {
    "^3.4".into()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            app_id: None,
            version: default_upstream_version(),
            api_key: None,
            api_key_env: Some("AGENT_RUN_API_KEY".into()),
        }
    }
}

impl UpstreamConfig {
    /// Resolve the API key: check `api_key` first, then `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

/// Thought summarization (Anthropic Messages) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_base_url")]
    pub base_url: String,

    #[serde(default = "default_summarizer_model")]
    pub model: String,

    /// Hard cap on summary length (default: 30 tokens — a short phrase).
    #[serde(default = "default_summarizer_max_tokens")]
    pub max_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

fn default_summarizer_base_url() -> String {
    "https://api.anthropic.com/v1".into()
}

fn default_summarizer_model() -> String {
    "claude-3-5-haiku-latest".into()
}

fn default_summarizer_max_tokens() -> u32 {
    30
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: default_summarizer_base_url(),
            model: default_summarizer_model(),
            max_tokens: default_summarizer_max_tokens(),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".into()),
        }
    }
}

impl SummarizerConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "agent_trail_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,
}

fn default_log_format() -> String {
    "plain".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::AgentTrailError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::AgentTrailError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Resolve the default config file path.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or_else(default_port)
    }

    /// Upstream section with defaults applied when absent.
    pub fn upstream(&self) -> UpstreamConfig {
        self.upstream.clone().unwrap_or_default()
    }

    /// Summarizer section with defaults applied when absent.
    pub fn summarizer(&self) -> SummarizerConfig {
        self.summarizer.clone().unwrap_or_default()
    }

    /// Check the config for problems a user would want to know about before
    /// starting the gateway. Returns (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let errors = Vec::new();

        let upstream = self.upstream();
        if upstream.app_id.as_deref().unwrap_or("").is_empty() {
            warnings.push("upstream.app_id is not set — run requests will be rejected".into());
        }
        if upstream.resolve_api_key().is_none() {
            warnings.push("no upstream API key configured (upstream.api_key / api_key_env)".into());
        }
        if self.summarizer().resolve_api_key().is_none() {
            warnings.push("no summarizer API key configured — /api/summarize will return 500".into());
        }

        (warnings, errors)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for Agent Trail data: `~/.agent_trail/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agent_trail")
}
