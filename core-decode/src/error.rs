//! # Decode Error Types
//!
//! Construction errors are surfaced synchronously to the caller. Mid-stream
//! problems (bad packet headers, codec failures on one packet) never show up
//! here; they degrade to silence inside the decode step.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while constructing or controlling a decoder.
#[derive(Error, Debug)]
pub enum DecodeError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Failed to open or read the audio file.
    #[error("Unable to open audio file {path}: {message}")]
    SourceError { path: String, message: String },

    // ========================================================================
    // Format/Codec Errors
    // ========================================================================
    /// File or packet layout is not recognized.
    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    /// A channel decoder could not be created.
    #[error("Error creating audio decoder: {0}")]
    CodecCreation(String),

    /// A codec failed to decode a packet.
    #[error("Codec error: {0}")]
    CodecError(String),

    // ========================================================================
    // Control Errors
    // ========================================================================
    /// Configuration values are out of range.
    #[error("Invalid decoder configuration: {0}")]
    InvalidConfig(String),

    /// Decode work for this instance did not finish in time.
    #[error("Decoder still has {outstanding} outstanding task(s) after {waited:?}")]
    DecoderBusy { outstanding: usize, waited: Duration },

    /// The stream must be open for this operation.
    #[error("Stream is closed")]
    StreamClosed,

    /// The decode worker pool could not be started.
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DecodeError {
    pub(crate) fn source_error(path: &Path, message: impl Into<String>) -> Self {
        DecodeError::SourceError {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DecodeError::DecoderBusy { .. })
    }

    /// Returns `true` if the error comes from the file contents rather than I/O.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            DecodeError::InvalidFormat(_) | DecodeError::CodecCreation(_)
        )
    }
}

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;
