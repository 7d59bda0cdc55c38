use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    /// Supports ${ENV_VAR} substitution
    pub api_key: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SandboxConfig {
    /// Root directory for all file and shell operations.
    /// Defaults to the directory containing the running executable.
    pub root: Option<PathBuf>,
}

/// Fixed execution limits; never mutated at runtime.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Hard ceiling on model invocations per user input.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Wall-clock timeout for one shell command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_turns() -> usize {
    10
}

fn default_command_timeout() -> u64 {
    30
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${ANTHROPIC_API_KEY}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}

impl SandboxConfig {
    /// Resolves the sandbox root: the configured directory, or the
    /// directory containing the running executable.
    pub fn resolve_root(&self) -> anyhow::Result<PathBuf> {
        if let Some(ref root) = self.root {
            return Ok(root.clone());
        }
        let exe = std::env::current_exe()?;
        exe.parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| anyhow::anyhow!("Executable has no parent directory"))
    }
}
