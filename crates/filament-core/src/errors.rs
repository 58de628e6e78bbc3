//! Relay error taxonomy.
//!
//! Every variant is terminal to the one connection it occurred on. The
//! [`close_code`](RelayError::close_code) mapping decides how that
//! connection is closed.

use thiserror::Error;

use crate::close::CloseCode;
use crate::filament::Topic;

/// Errors raised while opening a session or routing a frame.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The filament has a blank domain or name.
    #[error("incomplete filament information")]
    IncompleteFilament,

    /// The message claims a topic the connection is not subscribed to.
    #[error("connection is not subscribed to {topic}")]
    NotSubscribed {
        /// Topic the message claimed.
        topic: Topic,
    },

    /// The frame could not be decoded as a message envelope.
    #[error("malformed message envelope: {0}")]
    MalformedEnvelope(String),

    /// No frame arrived within the configured idle timeout.
    #[error("connection idle for {0:?}")]
    IdleTimeout(std::time::Duration),

    /// The server is shutting down.
    #[error("server shutting down")]
    ShuttingDown,

    /// The session was already closed.
    #[error("session is closed")]
    SessionClosed,
}

impl RelayError {
    /// Close code used to terminate the connection.
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::IncompleteFilament => CloseCode::IncompleteFilament,
            Self::NotSubscribed { .. } => CloseCode::NotSubscribed,
            Self::MalformedEnvelope(_) => CloseCode::MalformedEnvelope,
            Self::IdleTimeout(_) | Self::ShuttingDown => CloseCode::GoingAway,
            Self::SessionClosed => CloseCode::Normal,
        }
    }

    /// Reason string sent in the close frame.
    pub fn close_reason(&self) -> &'static str {
        self.close_code().reason()
    }
}

/// Result alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
