//! Language-model backend (Ollama `/api/generate`).

use super::{BackendClient, OLLAMA};
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

impl BackendClient {
    /// Run a single non-streaming generation and return only the `response` text.
    #[instrument(skip(self, prompt), fields(url = %self.ollama_url, prompt_len = prompt.len()))]
    pub async fn generate(&self, model: &str, prompt: &str) -> AppResult<String> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .http
            .post(&self.ollama_url)
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::dependency(OLLAMA, e))?;

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::dependency(OLLAMA, e))?;

        let text = result.response.unwrap_or_default();
        debug!(response_len = text.len(), "Ollama response");
        Ok(text)
    }
}
