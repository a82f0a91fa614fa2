//! # Audio Module
//!
//! Everything between "bytes arrived over HTTP" and "a canonical WAV is on disk".
//!
//! ## Key Components:
//! - **Ingest**: detects the request envelope and extracts the raw audio bytes
//! - **Scratch**: per-request temporary files that delete themselves
//! - **Transcoder**: runs ffmpeg to produce the canonical format
//! - **WAV probe**: reads the converted header back for diagnostics
//!
//! ## Canonical Format:
//! - **Sample Rate**: 16kHz (16,000 Hz)
//! - **Bit Depth**: 16-bit signed PCM, little-endian
//! - **Channels**: Mono (1 channel)
//! - **Band**: highpass at 80 Hz, lowpass at 8 kHz

pub mod ingest; // Envelope detection and decoding
pub mod scratch; // Scoped temporary files
pub mod transcoder; // ffmpeg subprocess
pub mod wav; // RIFF/WAVE header probe
