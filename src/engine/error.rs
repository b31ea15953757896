//! Error types for the labscope engine
//!
//! Only transport-level failures are fatal to a run; every recoverable
//! condition travels the diagnostic side channel instead (see `diag`).

use thiserror::Error;

/// Top-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level failure (fatal to the run)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// `start` was called while a run is already active
    #[error("a run is already active")]
    AlreadyActive,
}

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying HTTP failure while connecting or reading the stream
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend rejected the request with a non-success status
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        message: String,
    },
}

/// Convenience result alias for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Result type using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
