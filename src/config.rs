use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub github: GitHubConfig,
    #[serde(default)]
    pub claude: ClaudeConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub triage: TriageConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// Override for GitHub Enterprise installations.
    #[serde(default)]
    pub api_url: Option<String>,
}

// Manual Debug impl to avoid leaking the token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct ClaudeConfig {
    /// Only required by commands that run the oracle.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ClaudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .finish()
    }
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_workspace_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
    /// Failure logs are cut down to their last `max_log_chars` characters.
    #[serde(default = "default_max_log_chars")]
    pub max_log_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            max_search_results: default_max_search_results(),
            max_log_chars: default_max_log_chars(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TriageConfig {
    /// Branch include patterns for `list`. Empty means main/master only.
    #[serde(default)]
    pub include_branches: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_oracle_timeout_secs")]
    pub oracle_timeout_secs: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            include_branches: Vec::new(),
            batch_size: default_batch_size(),
            oracle_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OracleConfig {
    /// Trace viewer base URL; the session id is appended to it.
    #[serde(default)]
    pub trace_base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_max_turns() -> u32 {
    50
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("/tmp/triage-workspaces")
}

fn default_max_file_size() -> usize {
    512 * 1024 // 512 KB
}

fn default_max_search_results() -> usize {
    50
}

fn default_max_log_chars() -> usize {
    30_000
}

fn default_batch_size() -> usize {
    3
}

fn default_oracle_timeout_secs() -> u64 {
    30 * 60
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Conventional credential variables act as the lowest-priority source
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            builder = builder
                .set_default("github.token", token)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            builder = builder
                .set_default("claude.api_key", key)
                .map_err(|e| AppError::Config(e.to_string()))?;
        }

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(config::File::with_name("triage").required(false));
        }

        // Environment variable overrides with TRIAGE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TRIAGE")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("triage.include_branches")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.github.token.trim().is_empty() {
            return Err(AppError::Config(
                "GitHub token is empty (set GITHUB_TOKEN or TRIAGE__GITHUB__TOKEN)".to_string(),
            ));
        }
        if self.triage.batch_size == 0 {
            return Err(AppError::Config("triage.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Fails unless an Anthropic API key is configured.
    pub fn require_claude_key(&self) -> Result<&str> {
        let key = self.claude.api_key.trim();
        if key.is_empty() {
            return Err(AppError::Config(
                "Anthropic API key is empty (set ANTHROPIC_API_KEY or TRIAGE__CLAUDE__API_KEY)"
                    .to_string(),
            ));
        }
        Ok(key)
    }

    pub fn oracle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.triage.oracle_timeout_secs)
    }
}
