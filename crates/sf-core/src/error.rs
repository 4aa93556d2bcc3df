//! Error types for StemForge core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Channel count mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("Length mismatch: expected {expected} frames, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Sample rate mismatch: expected {expected}, got {got}")]
    SampleRateMismatch { expected: u32, got: u32 },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
