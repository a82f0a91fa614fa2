//! Speech-to-text backend (whisper.cpp server style `/inference` endpoint).

use super::{BackendClient, WHISPER};
use crate::error::{AppError, AppResult};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, instrument};

/// JSON body returned by the speech-to-text backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhisperTranscription {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl BackendClient {
    /// Upload the WAV at `wav_path` and return the backend's JSON answer.
    ///
    /// The form always asks for a plain JSON response, automatic language
    /// detection (empty `language`) and the `transcribe` task.
    #[instrument(skip(self), fields(url = %self.whisper_url))]
    pub async fn transcribe(&self, wav_path: &Path) -> AppResult<WhisperTranscription> {
        let audio = tokio::fs::read(wav_path).await?;
        let file_name = wav_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        let file_part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| AppError::dependency(WHISPER, e))?;

        let form = Form::new()
            .part("file", file_part)
            .text("response_format", "json")
            .text("language", "")
            .text("task", "transcribe");

        debug!("Sending to Whisper");
        let response = self
            .http
            .post(&self.whisper_url)
            .multipart(form)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::dependency(WHISPER, e))?;

        let result: WhisperTranscription = response
            .json()
            .await
            .map_err(|e| AppError::dependency(WHISPER, e))?;

        debug!(
            language = ?result.language,
            duration = ?result.duration,
            "Whisper response"
        );
        Ok(result)
    }
}
