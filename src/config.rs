//! YAML configuration with per-field defaults.
//!
//! Sections: `backend`, `search`, `notes`, `execution`. A missing file yields
//! the defaults. URL and API-key fields go through environment-variable
//! expansion (`$VAR` / `${VAR}`); variables that are not set stay verbatim.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Chat-completion providers the backend adapter can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local Ollama daemon, `/api/chat`.
    Ollama,
    /// OpenAI-compatible vLLM deployment, `/v1/chat/completions`.
    Vllm,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "vllm" => Ok(Provider::Vllm),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => write!(f, "ollama"),
            Provider::Vllm => write!(f, "vllm"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Kept as text so an unknown provider surfaces when the adapter is built.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Seconds.
    pub request_timeout: u64,
    pub max_retries: u32,
    /// Seconds, multiplied by the attempt number.
    pub retry_backoff: f64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "gpt-oss:20b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            request_timeout: 60,
            max_retries: 3,
            retry_backoff: 2.0,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub max_results: u32,
    pub base_url: String,
    pub request_timeout: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: 5,
            base_url: "https://api.tavily.com".to_string(),
            request_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    pub persist_directory: PathBuf,
    /// Directory scanned for `.md` / `.txt` notes at startup.
    pub source_directory: PathBuf,
    pub top_k: usize,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("./data/index"),
            source_directory: PathBuf::from("./data"),
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub server_url: String,
    /// Shell command used to launch a local server when the handshake fails.
    pub startup_command: Option<String>,
    pub handshake_path: String,
    pub max_retries: u32,
    pub retry_backoff: f64,
    /// Milliseconds to wait after launching before re-checking.
    pub startup_grace_ms: u64,
    pub handshake_timeout: u64,
    pub request_timeout: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            startup_command: None,
            handshake_path: "/health".to_string(),
            max_retries: 3,
            retry_backoff: 2.0,
            startup_grace_ms: 1000,
            handshake_timeout: 5,
            request_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub search: SearchConfig,
    pub notes: NotesConfig,
    pub execution: ExecutionConfig,
}

impl AppConfig {
    /// Parse a YAML document, then expand environment variables.
    pub fn from_yaml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty document deserializes to `null`; treat it as all defaults.
        let mut config: AppConfig = if raw.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };
        config.expand_env();
        Ok(config)
    }

    fn expand_env(&mut self) {
        self.backend.base_url = expand(&self.backend.base_url);
        self.backend.api_key = self.backend.api_key.as_deref().map(expand);
        self.search.base_url = expand(&self.search.base_url);
        self.search.api_key = self
            .search
            .api_key
            .as_deref()
            .map(expand)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("TAVILY_API_KEY").ok());
        self.execution.server_url = expand(&self.execution.server_url);
    }
}

fn expand(value: &str) -> String {
    shellexpand::env_with_context_no_errors(value, |name| std::env::var(name).ok()).into_owned()
}

/// Load configuration from `path`, falling back to defaults when it is absent.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        let mut config = AppConfig::default();
        config.expand_env();
        return Ok(config);
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = AppConfig::from_yaml_str(&raw, path)?;
    debug!(
        provider = %config.backend.provider,
        model = %config.backend.model,
        "Loaded config from {}",
        path.display()
    );
    Ok(config)
}
