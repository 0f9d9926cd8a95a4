//! Error types for readning-cue
//!
//! Capability failures (detector, generator) stay inside their stage and are
//! turned into degraded results there. Only pre-flight rejections and
//! persistence failures reach the caller as [`PipelineError`].

use thiserror::Error;

/// Errors that abort a unit of work and are reported to the caller
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input rejected before any capability was invoked
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generated output could not be stored
    #[error("Persistence failed: {0}")]
    Persistence(#[from] readning_common::Error),
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Persistence(readning_common::Error::Io(err))
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Phase-detection capability failures
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Detector timed out after {0} s")]
    Timeout(u64),

    /// Non-success status that is not worth retrying (4xx)
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The backend has no such call path
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DetectorError {
    /// Transport trouble and malformed output are both worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectorError::Network(_) | DetectorError::Timeout(_) | DetectorError::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for DetectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DetectorError::InvalidResponse(err.to_string())
        } else {
            DetectorError::Network(err.to_string())
        }
    }
}

/// Audio generation capability failures
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Generation timed out after {0} s")]
    Timeout(u64),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Payload that is not a readable WAV stream
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    /// Blocking model call panicked or was cancelled
    #[error("Blocking task failed: {0}")]
    Blocking(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(err: reqwest::Error) -> Self {
        GeneratorError::Network(err.to_string())
    }
}

impl From<hound::Error> for GeneratorError {
    fn from(err: hound::Error) -> Self {
        GeneratorError::InvalidAudio(err.to_string())
    }
}
