//! Error types for murmur-client

use thiserror::Error;

/// Result type alias using murmur-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a conversation exchange
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed before or during streaming
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("service returned status {status}")]
    BadStatus { status: reqwest::StatusCode },

    /// The event stream failed mid-exchange
    #[error("stream error: {0}")]
    Stream(String),

    /// No data arrived within the idle timeout
    #[error("stream stalled past the idle timeout")]
    Timeout,

    /// A second send was issued while an exchange was still in flight
    #[error("an exchange is already in flight")]
    ConcurrentSend,

    /// Conversation reset requested while an exchange was still in flight
    #[error("cannot reset the conversation while an exchange is in flight")]
    ResetWhileBusy,

    /// A turn with this outgoing id already exists
    #[error("turn already exists: {id}")]
    DuplicateTurn { id: String },

    /// No turn with this outgoing id was ever created
    #[error("no such turn: {id}")]
    UnknownTurn { id: String },
}

impl Error {
    /// Check if this error is a transport failure (network, status, stall)
    /// as opposed to a caller-misuse defect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::BadStatus { .. } | Error::Stream(_) | Error::Timeout
        )
    }
}
