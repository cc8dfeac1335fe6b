//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside the sync engine.
///
/// Transport failures never escape the channel loop: they become a
/// transition to `Disconnected`. Non-retryable ones are also logged at
/// error level, but the channel retries them all the same.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The transport was closed by the peer.
    #[error("transport closed")]
    Closed,

    /// A connection attempt neither opened nor failed in time.
    #[error("connection attempt timed out")]
    ConnectTimeout,

    /// The channel endpoint could not be derived.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Closed | EngineError::ConnectTimeout => true,
            _ => false,
        }
    }
}
