//! Error types for audio file I/O

use sf_core::CoreError;
use thiserror::Error;

/// Audio file errors
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt audio: {0}")]
    CorruptAudio(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid buffer: {0}")]
    Buffer(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for file operations
pub type FileResult<T> = Result<T, FileError>;
