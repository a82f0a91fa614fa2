//! # Transcription Module
//!
//! Drives a `/transcribe` request from upload to text. The actual speech
//! recognition happens in the remote whisper backend; this module owns the
//! ordering of the steps and the lifetime of the files they share.

pub mod pipeline;

pub use pipeline::TranscriptionPipeline;
