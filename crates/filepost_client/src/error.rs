//! Client error types.

use filepost_protocol::ProtocolError;
use thiserror::Error;

/// Errors a client session can produce.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A server reply failed to decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server refused the authentication attempt.
    #[error("authentication refused with status {status}")]
    AuthRejected {
        /// Status code from the refusal reply (403 or 429).
        status: i16,
    },

    /// The server answered with a message the current operation cannot
    /// interpret.
    #[error("unexpected reply: expected {expected}, got kind {kind}")]
    UnexpectedResponse {
        /// What the operation was waiting for.
        expected: &'static str,
        /// Kind byte of the reply actually received.
        kind: u8,
    },

    /// The server closed the connection while a reply was expected.
    #[error("connection closed by the server")]
    ConnectionClosed,

    /// The external editor could not be run or exited abnormally.
    #[error("editor failed: {message}")]
    Editor {
        /// Human-readable description.
        message: String,
    },

    /// Transport failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Creates an [`ClientError::Editor`] from any displayable message.
    pub fn editor(message: impl Into<String>) -> Self {
        Self::Editor {
            message: message.into(),
        }
    }

    /// True when authentication was refused because the server is at
    /// its connection capacity rather than because the credentials were
    /// wrong.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::AuthRejected {
                status: filepost_protocol::status::TOO_MANY_CONNECTIONS
            }
        )
    }
}

/// Convenience alias for client results.
pub type ClientResult<T> = Result<T, ClientError>;
