//! Error types for flowbuf.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowbufError>;

/// Top level error type for the flowbuf pipeline.
#[derive(Error, Debug)]
pub enum FlowbufError {
    /// I/O errors surfaced from the underlying producer/consumer file descriptors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A startup-time configuration problem; these abort before any thread starts.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human readable description of the offending setting.
        message: String,
    },

    /// A destination-local error (open/write/finalize failure on one output).
    #[error("destination {name}: {message}")]
    Destination {
        /// Logical name of the destination that failed.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// A failure in the input- or output-side volume-change protocol.
    #[error("volume change failed: {message}")]
    Volume {
        /// Description of the failure.
        message: String,
    },

    /// Generic error for unexpected conditions not covered above.
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Description of the unexpected condition.
        message: String,
    },
}

impl FlowbufError {
    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create a new destination-local error.
    pub fn destination(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Destination { name: name.into(), message: message.into() }
    }

    /// Create a new volume-change error.
    pub fn volume(message: impl Into<String>) -> Self {
        Self::Volume { message: message.into() }
    }

    /// Create a new catch-all "should not happen" error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected { message: message.into() }
    }
}
