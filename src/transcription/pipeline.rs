//! # Transcription Pipeline
//!
//! Sequences one `/transcribe` request:
//!
//! 1. **Ingest**: decode the envelope into raw audio bytes
//! 2. **Allocate**: write the bytes to an input scratch artifact and reserve a
//!    second one for the canonical WAV
//! 3. **Convert**: run the transcoder from input to canonical
//! 4. **Transcribe**: upload the canonical WAV to the speech backend
//! 5. **Shape**: trim the text and default the language
//!
//! Steps 2 to 5 run on a spawned task that owns both scratch artifacts. A client
//! disconnect drops the request future but not that task, so ffmpeg and the
//! backend call run to completion and the artifacts are released only after
//! nothing else can write to them.

use crate::audio::ingest::{AudioPayload, IngestionDecoder};
use crate::audio::scratch::{ScratchArtifact, ScratchSpace};
use crate::audio::transcoder::Transcoder;
use crate::audio::wav::{WavInfo, CANONICAL};
use crate::backend::{BackendClient, WhisperTranscription};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use actix_web::{web, HttpRequest};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn, Instrument};

/// Language reported when the backend does not detect one.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Outcome of a successful transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: String,
}

impl From<WhisperTranscription> for TranscriptionResult {
    fn from(response: WhisperTranscription) -> Self {
        Self {
            text: response.text.unwrap_or_default().trim().to_string(),
            language: response
                .language
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
        }
    }
}

/// Decoder, transcoder and speech backend wired together.
#[derive(Debug, Clone)]
pub struct TranscriptionPipeline {
    decoder: IngestionDecoder,
    transcoder: Transcoder,
    backend: BackendClient,
    scratch_dir: Option<PathBuf>,
}

impl TranscriptionPipeline {
    pub fn new(config: &AppConfig, backend: BackendClient) -> Self {
        Self {
            decoder: IngestionDecoder::new(config.server.max_upload_bytes),
            transcoder: Transcoder::new(&config.transcoder),
            backend,
            scratch_dir: config.transcoder.scratch_dir.clone(),
        }
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    /// Run the whole pipeline for one request.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn handle_transcribe(
        &self,
        req: &HttpRequest,
        payload: web::Payload,
    ) -> AppResult<TranscriptionResult> {
        let scratch = ScratchSpace::new(self.scratch_dir.as_deref());
        tracing::Span::current().record("request_id", tracing::field::display(scratch.request_id()));

        let audio = self.decoder.decode(req, payload).await?;

        let pipeline = self.clone();
        let task = tokio::spawn(
            pipeline
                .transcribe_payload(audio, scratch)
                .instrument(tracing::Span::current()),
        );

        task.await
            .map_err(|e| AppError::Internal(format!("Transcription task failed: {}", e)))?
    }

    /// Steps 2 to 5. Owns everything it touches so it can outlive the request.
    async fn transcribe_payload(
        self,
        audio: AudioPayload,
        scratch: ScratchSpace,
    ) -> AppResult<TranscriptionResult> {
        let input = audio.persist(&scratch).await?;
        let canonical = scratch.create("canonical", ".wav")?;

        let result = self.transcribe_artifact(&input, &canonical).await;

        input.release();
        canonical.release();
        result
    }

    /// Steps 3 to 5 over already-allocated artifacts.
    async fn transcribe_artifact(
        &self,
        input: &ScratchArtifact,
        canonical: &ScratchArtifact,
    ) -> AppResult<TranscriptionResult> {
        let input_bytes = input.size_on_disk().await;
        debug!(
            role = input.role(),
            bytes = input_bytes,
            "Converting to canonical format"
        );
        let converted_bytes = self.transcoder.convert(input.path(), canonical.path()).await?;

        match WavInfo::probe(canonical.path()).await {
            Ok(info) if info.matches(&CANONICAL) => debug!(
                bytes = converted_bytes,
                duration_secs = info.duration_secs(),
                "Canonical audio ready"
            ),
            Ok(info) => warn!(
                sample_rate = info.sample_rate,
                channels = info.channels,
                bits_per_sample = info.bits_per_sample,
                "Converted audio does not match the canonical format"
            ),
            Err(e) => warn!(error = %e, "Could not read converted WAV header"),
        }

        let response = self.backend.transcribe(canonical.path()).await?;
        let result = TranscriptionResult::from(response);

        info!(
            language = %result.language,
            text_len = result.text.len(),
            "Transcription complete"
        );
        Ok(result)
    }
}
