//! # Backend Client
//!
//! Stateless HTTP wrappers around the two inference services the gateway fronts:
//! - **whisper**: speech-to-text, fed a canonical WAV as a multipart upload
//! - **ollama**: language-model generation, fed a JSON prompt
//!
//! Both calls share one `reqwest::Client`. No timeout is applied unless
//! `backends.timeout_secs` is configured; there are no retries.

pub mod ollama;
pub mod whisper;

use crate::config::BackendsConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use tracing::info;

pub use whisper::WhisperTranscription;

/// Service name used in errors and logs for the speech-to-text backend.
pub const WHISPER: &str = "whisper";

/// Service name used in errors and logs for the language-model backend.
pub const OLLAMA: &str = "ollama";

/// HTTP client for the speech-to-text and language-model backends.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    whisper_url: String,
    ollama_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendsConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build backend HTTP client")?;

        info!(
            whisper_url = %config.whisper_url,
            ollama_url = %config.ollama_url,
            timeout_secs = ?config.timeout_secs,
            "Initialized backend client"
        );

        Ok(Self {
            http,
            whisper_url: config.whisper_url.clone(),
            ollama_url: config.ollama_url.clone(),
        })
    }
}
