//! Error types for wavesink
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Push-path errors on the hot path have their own small type
//! in `pipeline::pool`; this is the crate-level surface.

use thiserror::Error;

/// Main error type for wavesink
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Invalid playback state for the requested transition
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using wavesink Error
pub type Result<T> = std::result::Result<T, Error>;
