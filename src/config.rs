//! # Configuration Management
//!
//! This module handles loading and validating the gateway configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! The configuration is built exactly once at startup and then handed to the
//! backend client and the transcription pipeline by parameter. Nothing reads
//! backend URLs from global state.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Deployment shortcuts (HOST, PORT, WHISPER_URL, OLLAMA_URL)
//! 2. Environment variables (APP_SERVER__PORT, APP_BACKENDS__WHISPER_URL, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// The gateway talks to three collaborators (its own HTTP clients, two inference
/// backends, and the ffmpeg binary). Each gets its own section so operators can
/// override one without restating the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backends: BackendsConfig,
    pub transcoder: TranscoderConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on
/// - `max_upload_bytes`: largest `/transcribe` body accepted, for either envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Inference backend endpoints.
///
/// ## Fields:
/// - `whisper_url`: full URL of the speech-to-text inference endpoint (multipart upload)
/// - `ollama_url`: full URL of the language-model generate endpoint (JSON body)
/// - `default_model`: model name used when `/ask-ollama` does not name one
/// - `timeout_secs`: per-request timeout for both backends; unset means wait indefinitely
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub whisper_url: String,
    pub ollama_url: String,
    pub default_model: String,
    pub timeout_secs: Option<u64>,
}

/// Audio normalization settings.
///
/// ## Fields:
/// - `ffmpeg_path`: binary to invoke, resolved through PATH when not absolute
/// - `timeout_secs`: upper bound for one conversion; unset means wait indefinitely
/// - `scratch_dir`: where scratch artifacts are created; unset means the OS temp dir
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    pub ffmpeg_path: String,
    pub timeout_secs: Option<u64>,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_upload_bytes: 50 * 1024 * 1024,
            },
            backends: BackendsConfig {
                whisper_url: "http://127.0.0.1:8100/inference".to_string(),
                ollama_url: "http://localhost:11434/api/generate".to_string(),
                default_model: "llama3.1:8b".to_string(),
                timeout_secs: None,
            },
            transcoder: TranscoderConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                timeout_secs: None,
                scratch_dir: None,
            },
        }
    }
}

impl BackendsConfig {
    /// Timeout applied to backend HTTP calls, `None` meaning no limit.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl TranscoderConfig {
    /// Timeout applied to one ffmpeg run, `None` meaning no limit.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_ (`__` separates sections)
    /// 4. Apply the HOST / PORT / WHISPER_URL / OLLAMA_URL shortcuts
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_BACKENDS__WHISPER_URL=http://gpu-box:8100/inference`: Move the speech backend
    /// - `APP_TRANSCODER__TIMEOUT_SECS=120`: Bound ffmpeg runs to two minutes
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let shortcuts = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("WHISPER_URL", "backends.whisper_url"),
            ("OLLAMA_URL", "backends.ollama_url"),
        ];
        for (var, key) in shortcuts {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 and the upload cap is positive
    /// - Both backend URLs are absolute http(s) URLs
    /// - A default model and an ffmpeg binary are named
    /// - Configured timeouts are not zero (leave them unset to wait forever)
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow!("Max upload size must be greater than 0"));
        }

        validate_http_url("backends.whisper_url", &self.backends.whisper_url)?;
        validate_http_url("backends.ollama_url", &self.backends.ollama_url)?;

        if self.backends.default_model.trim().is_empty() {
            return Err(anyhow!("Default model cannot be empty"));
        }

        if self.transcoder.ffmpeg_path.trim().is_empty() {
            return Err(anyhow!("ffmpeg path cannot be empty"));
        }

        if self.backends.timeout_secs == Some(0) || self.transcoder.timeout_secs == Some(0) {
            return Err(anyhow!("Timeouts must be greater than 0; leave unset to wait indefinitely"));
        }

        Ok(())
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value).map_err(|e| anyhow!("{} is not a valid URL: {}", key, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(anyhow!("{} must use http or https, got '{}'", key, other)),
    }
}
