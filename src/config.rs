//! Runtime configuration for gemini-gateway.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! command-line flags and environment variables. The upstream API key is only
//! ever taken from the command line or the environment, never from the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model used when neither the file nor the environment names one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No GOOGLE_API_KEY found in environment variables")]
    MissingApiKey,

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gemini-gateway", about = "HTTP gateway for the Gemini generative-language API")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "gateway.json")]
    pub config: PathBuf,

    /// Interface to bind.
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP listen port.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Upstream model identifier.
    #[arg(long, env = "GEMINI_MODEL")]
    pub model: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub streaming: StreamingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream generative API settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Model identifier, e.g. `gemini-2.0-flash`.
    pub model: String,

    /// REST base URL, without a trailing `/models` segment.
    pub base_url: String,

    /// Whole-request timeout. Unset means the HTTP client's defaults apply.
    pub request_timeout_secs: Option<u64>,

    #[serde(skip)]
    pub api_key: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            api_key: String::new(),
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// SSE relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Idle interval after which a keep-alive comment is sent.
    pub keep_alive_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { keep_alive_secs: 15 }
    }
}

impl StreamingConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line and environment overrides on top of file settings.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(model) = &cli.model {
            self.upstream.model = model.clone();
        }
        if let Some(key) = &cli.api_key {
            self.upstream.api_key = key.trim().to_string();
        }
    }

    /// Refuse to run without credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Build the effective configuration for a process invocation.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Config::load(&cli.config)?;
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }
}
