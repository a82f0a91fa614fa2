//! # Ingestion Decoder
//!
//! Turns an inbound `/transcribe` request into the raw audio bytes it carries,
//! without interpreting those bytes, and writes them to a scratch artifact.
//!
//! ## Supported Envelopes:
//! - **multipart/form-data**: the audio is the `file` field (a part with a filename)
//! - **application/json**: `{"audio_data": "<base64>"}`, optionally as a data URL
//!
//! Whatever the envelope, the transcoder receives the same bytes the client sent.

use crate::audio::scratch::{ScratchArtifact, ScratchSpace};
use crate::error::{AppError, AppResult};
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::stream::StreamExt;
use std::fmt;
use tracing::{debug, info};

/// Multipart form field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// JSON field carrying the base64 payload.
pub const AUDIO_DATA_FIELD: &str = "audio_data";

/// Suffix hint for multipart uploads without a usable filename extension.
const DEFAULT_UPLOAD_SUFFIX: &str = ".tmp";

/// Suffix hint for base64 payloads. Only a hint for ffmpeg's probing; the bytes
/// are not assumed to really be AAC.
const BASE64_SUFFIX: &str = ".aac";

/// Outer transport encoding of a `/transcribe` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    Multipart,
    Json,
}

impl EnvelopeKind {
    /// Pick the envelope from a declared `Content-Type` header.
    pub fn from_content_type(content_type: Option<&str>) -> AppResult<Self> {
        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("multipart/form-data") {
            Ok(EnvelopeKind::Multipart)
        } else if content_type.contains("application/json") {
            Ok(EnvelopeKind::Json)
        } else {
            Err(AppError::Input(
                "Invalid content type. Use multipart/form-data or application/json".to_string(),
            ))
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeKind::Multipart => write!(f, "multipart"),
            EnvelopeKind::Json => write!(f, "json"),
        }
    }
}

/// Raw audio bytes plus the scratch-file suffix to store them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub format_hint: String,
}

impl AudioPayload {
    /// Write the bytes to a fresh scratch artifact.
    pub async fn persist(&self, scratch: &ScratchSpace) -> AppResult<ScratchArtifact> {
        let artifact = scratch.write("input", &self.format_hint, &self.bytes).await?;
        debug!(
            role = artifact.role(),
            bytes = self.bytes.len(),
            path = %artifact.path().display(),
            "Saved input file"
        );
        Ok(artifact)
    }
}

/// Decodes request envelopes into scratch artifacts.
#[derive(Debug, Clone)]
pub struct IngestionDecoder {
    max_bytes: usize,
}

impl IngestionDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Decode the request body according to its `Content-Type`.
    ///
    /// Nothing touches the disk here; [`AudioPayload::persist`] writes the bytes
    /// once the caller owns the rest of the request's lifetime.
    pub async fn decode(&self, req: &HttpRequest, payload: web::Payload) -> AppResult<AudioPayload> {
        let content_type = req
            .headers()
            .get(actix_web::http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());

        let kind = EnvelopeKind::from_content_type(content_type)?;
        let audio = match kind {
            EnvelopeKind::Multipart => {
                self.decode_multipart(Multipart::new(req.headers(), payload)).await?
            }
            EnvelopeKind::Json => {
                let body = self.read_body(payload).await?;
                self.decode_json(&body)?
            }
        };

        info!(envelope = %kind, bytes = audio.bytes.len(), "Received audio");
        Ok(audio)
    }

    /// Pull the `file` field out of a multipart form. A part only counts as the
    /// upload when it carries a filename.
    pub async fn decode_multipart(&self, mut form: Multipart) -> AppResult<AudioPayload> {
        let mut upload: Option<AudioPayload> = None;

        while let Some(item) = form.next().await {
            let mut field = item?;

            let filename = field
                .content_disposition()
                .filter(|disposition| disposition.get_name() == Some(FILE_FIELD))
                .and_then(|disposition| disposition.get_filename())
                .map(str::to_string);
            let is_file = filename.is_some();

            // Other fields still have to be drained for the parser to move on.
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let chunk = chunk?;
                if is_file {
                    if bytes.len() + chunk.len() > self.max_bytes {
                        return Err(self.too_large());
                    }
                    bytes.extend_from_slice(&chunk);
                }
            }

            if is_file && upload.is_none() {
                debug!(filename = ?filename, bytes = bytes.len(), "Received multipart file");
                upload = Some(AudioPayload {
                    bytes,
                    format_hint: suffix_for(filename.as_deref()),
                });
            }
        }

        upload.ok_or_else(|| AppError::Input("No file provided".to_string()))
    }

    /// Decode a `{"audio_data": "<base64>"}` body.
    pub fn decode_json(&self, body: &[u8]) -> AppResult<AudioPayload> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| AppError::Input(format!("Invalid JSON body: {}", e)))?;

        let encoded = match value.get(AUDIO_DATA_FIELD) {
            None => return Err(AppError::Input("No audio_data provided in JSON".to_string())),
            Some(serde_json::Value::String(encoded)) => encoded,
            Some(_) => {
                return Err(AppError::Input(
                    "Invalid base64 audio data: audio_data must be a string".to_string(),
                ))
            }
        };

        debug!(chars = encoded.len(), "Received JSON with base64 audio data");
        let bytes = decode_base64(encoded)
            .map_err(|e| AppError::Input(format!("Invalid base64 audio data: {}", e)))?;

        Ok(AudioPayload {
            bytes,
            format_hint: BASE64_SUFFIX.to_string(),
        })
    }

    async fn read_body(&self, mut payload: web::Payload) -> AppResult<web::BytesMut> {
        let mut body = web::BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| AppError::Input(format!("Failed to read body: {}", e)))?;
            if body.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn too_large(&self) -> AppError {
        AppError::Input(format!("Audio upload exceeds {} bytes", self.max_bytes))
    }
}

/// Base64-decode `encoded`, accepting a `data:<mime>;base64,` prefix and
/// ignoring embedded ASCII whitespace.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };

    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

/// Scratch suffix for an uploaded filename: its extension when it is short and
/// alphanumeric, otherwise `.tmp`.
pub fn suffix_for(filename: Option<&str>) -> String {
    filename
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| (1..=8).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_SUFFIX.to_string())
}
