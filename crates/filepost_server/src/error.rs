//! Error types for the server.

use filepost_protocol::{status, ProtocolError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the filepost server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A frame failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] ProtocolError),

    /// Credential mismatch or unknown client rejected at registration.
    #[error("authentication failed for {client_id:?}")]
    AuthFailed {
        /// Identifier the client presented.
        client_id: String,
    },

    /// The session's role does not permit the operation.
    #[error("{client_id:?} lacks the role required for this operation")]
    NotAuthorized {
        /// Identifier of the offending session.
        client_id: String,
    },

    /// The connection registry is at capacity.
    #[error("connection capacity reached ({limit})")]
    CapacityReached {
        /// Configured session limit.
        limit: usize,
    },

    /// An upload declared a version other than the running one.
    #[error("version mismatch: upload targets {declared}, server runs {running}")]
    VersionMismatch {
        /// Version declared in the upload.
        declared: u8,
        /// Version the server is running.
        running: u8,
    },

    /// A log or file write failed.
    #[error("persistence failure: {message}")]
    Persistence {
        /// Description of the failure.
        message: String,
    },

    /// I/O error on the transport or listener.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// The protocol status code this error is reported as.
    pub fn status_code(&self) -> i16 {
        match self {
            ServerError::Decode(_) | ServerError::VersionMismatch { .. } => status::BAD_REQUEST,
            ServerError::AuthFailed { .. } | ServerError::NotAuthorized { .. } => {
                status::FORBIDDEN
            }
            ServerError::CapacityReached { .. } => status::TOO_MANY_CONNECTIONS,
            ServerError::Persistence { .. } | ServerError::Io(_) => status::INTERNAL_ERROR,
        }
    }
}
