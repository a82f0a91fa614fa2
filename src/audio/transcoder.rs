//! # Transcoder
//!
//! Normalizes arbitrary caller-supplied audio into the canonical waveform format
//! by running ffmpeg over a scratch file:
//!
//! ```text
//! ffmpeg -i <input> -ar 16000 -ac 1 -c:a pcm_s16le -af highpass=f=80,lowpass=f=8000 -y <output>
//! ```
//!
//! Every request goes through the same conversion, whatever the upstream
//! container or codec, so the speech backend only ever sees one format.

use crate::audio::wav::{CanonicalFormat, CANONICAL};
use crate::config::TranscoderConfig;
use crate::error::ConversionError;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, instrument};

/// Runs ffmpeg with fixed arguments.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: String,
    timeout: Option<Duration>,
    format: CanonicalFormat,
}

impl Transcoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: config.timeout(),
            format: CANONICAL,
        }
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Check whether ffmpeg can be started at all.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    /// Command-line arguments for converting `input` into `output`.
    pub fn arguments(&self, input: &Path, output: &Path) -> Vec<OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            "-ar".into(),
            self.format.sample_rate.to_string().into(),
            "-ac".into(),
            self.format.channels.to_string().into(),
            "-c:a".into(),
            format!("pcm_s{}le", self.format.bits_per_sample).into(),
            "-af".into(),
            format!(
                "highpass=f={},lowpass=f={}",
                self.format.highpass_hz, self.format.lowpass_hz
            )
            .into(),
            "-y".into(),
            output.as_os_str().to_owned(),
        ]
    }

    /// Convert the audio at `input` into a canonical WAV at `output`.
    ///
    /// ## Returns:
    /// - **Ok(bytes)**: size of the converted file
    /// - **Err(ConversionError)**: ffmpeg missing, non-zero exit, timeout, or an
    ///   empty/missing destination even though ffmpeg reported success
    #[instrument(skip(self), fields(ffmpeg = %self.ffmpeg_path))]
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<u64, ConversionError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(self.arguments(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Only a timed-out conversion should take the child down with it.
            .kill_on_drop(self.timeout.is_some());

        debug!("Running {:?}", cmd);

        let run = cmd.output();
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| ConversionError::TimedOut(limit))?,
            None => run.await,
        };

        let output_status = result.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ConversionError::ToolMissing {
                    tool: self.ffmpeg_path.clone(),
                }
            } else {
                ConversionError::Spawn {
                    tool: self.ffmpeg_path.clone(),
                    source: e,
                }
            }
        })?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr).trim().to_string();
            error!(status = %output_status.status, "FFmpeg error: {}", stderr);
            return Err(ConversionError::Failed { stderr });
        }

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size == 0 {
            return Err(ConversionError::EmptyOutput);
        }

        debug!(bytes = size, "Converted to WAV");
        Ok(size)
    }
}
