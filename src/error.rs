//! # Error Handling
//!
//! This module defines the error taxonomy of the gateway and how each kind is turned
//! into an HTTP response.
//!
//! ## Error Categories:
//! - **Input**: the client sent something we cannot use (400)
//! - **Conversion**: ffmpeg could not normalize the audio (500)
//! - **Dependency**: a speech or language-model backend failed or was unreachable (500)
//! - **Internal**: anything else that went wrong while serving the request (500)
//!
//! Status codes are decided only in [`ResponseError`] below; the rest of the code
//! deals in variants. Every error body has the same shape:
//!
//! ```json
//! { "error": "No file provided" }
//! ```

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Failure of the audio normalization step.
///
/// Every variant carries enough of ffmpeg's own diagnostics for an operator to
/// see why the conversion failed.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The ffmpeg binary could not be found on the execution path.
    #[error("FFmpeg not found (looked for '{tool}'). Install it with: apt install ffmpeg")]
    ToolMissing { tool: String },

    /// The binary exists but could not be started.
    #[error("Audio conversion failed: could not start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// ffmpeg exited with a non-zero status.
    #[error("Audio conversion failed: FFmpeg conversion failed: {stderr}")]
    Failed { stderr: String },

    /// ffmpeg reported success but the destination is missing or empty.
    #[error("Audio conversion failed: Converted file is empty or doesn't exist")]
    EmptyOutput,

    /// The configured conversion timeout elapsed; the child was killed.
    #[error("Audio conversion failed: FFmpeg did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),

    /// Reading or writing scratch files failed.
    #[error("Audio conversion failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing client-supplied data.
    #[error("{0}")]
    Input(String),

    /// The normalization step failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A downstream backend returned a non-success status or was unreachable.
    #[error("{message}")]
    Dependency { service: &'static str, message: String },

    /// Unexpected failures inside the gateway itself.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an HTTP client failure for the named backend, keeping its message verbatim.
    pub fn dependency(service: &'static str, err: reqwest::Error) -> Self {
        AppError::Dependency {
            service,
            message: err.to_string(),
        }
    }

    /// Short machine-readable kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Input(_) => "input",
            AppError::Conversion(_) => "conversion",
            AppError::Dependency { .. } => "dependency",
            AppError::Internal(_) => "internal",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Input(_) => StatusCode::BAD_REQUEST,
            AppError::Conversion(_) | AppError::Dependency { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::Input(format!("Multipart error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
