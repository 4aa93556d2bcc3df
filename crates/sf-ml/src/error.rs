//! Error types for separation

use sf_core::CoreError;
use sf_file::FileError;
use thiserror::Error;

/// Separation error types
#[derive(Error, Debug)]
pub enum MlError {
    /// Bad segment/overlap/shift parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Registry has no model under this name
    #[error("Model not found: {name}")]
    ModelNotFound { name: String },

    /// Model is known but could not be loaded
    #[error("Failed to load model {name}: {reason}")]
    ModelLoadFailed { name: String, reason: String },

    /// Requested stem is not produced by the model
    #[error("Unknown stem '{stem}' for model {model}")]
    UnknownStem { stem: String, model: String },

    /// Model raised an error while processing a segment
    #[error("Inference failed in model {model} at segment {segment}: {reason}")]
    InferenceFailure {
        model: String,
        segment: usize,
        reason: String,
    },

    /// Separation was cancelled between units of work
    #[error("Separation cancelled")]
    Cancelled,

    /// Channel count mismatch
    #[error("Channel count mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    /// Invalid output shape
    #[error("Invalid output shape: expected {expected}, got {got}")]
    InvalidOutputShape { expected: String, got: String },

    /// Tract error
    #[error("Tract error: {0}")]
    Tract(String),

    /// Audio buffer error
    #[error("Audio buffer error: {0}")]
    Core(#[from] CoreError),

    /// Decode/encode error
    #[error("Audio file error: {0}")]
    File(#[from] FileError),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MlError {
    /// Wrap an error raised by the model for a given segment
    pub fn inference(model: &str, segment: usize, reason: impl std::fmt::Display) -> Self {
        MlError::InferenceFailure {
            model: model.to_string(),
            segment,
            reason: reason.to_string(),
        }
    }
}

/// Result type for ML operations
pub type MlResult<T> = Result<T, MlError>;
