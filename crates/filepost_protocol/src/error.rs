//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer does not contain the end-of-frame marker.
    #[error("frame is missing the end marker")]
    MissingEndMarker,

    /// The frame decoded to zero fields.
    #[error("frame contains no fields")]
    EmptyFrame,

    /// A field required by the message kind is absent.
    #[error("message kind {kind} requires field {index}, frame has {actual} fields")]
    MissingField {
        /// Kind byte of the message being decoded.
        kind: u8,
        /// Index of the missing field.
        index: usize,
        /// Number of fields actually present.
        actual: usize,
    },

    /// The kind byte does not name a known message.
    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    /// A fixed-width numeric field has the wrong byte length.
    #[error("field {index} should be {expected} bytes, got {actual}")]
    BadFieldWidth {
        /// Index of the malformed field.
        index: usize,
        /// Expected byte width.
        expected: usize,
        /// Actual byte width.
        actual: usize,
    },

    /// A text field is not valid UTF-8.
    #[error("field {index} is not valid UTF-8")]
    InvalidUtf8 {
        /// Index of the malformed field.
        index: usize,
    },
}

impl ProtocolError {
    /// Create a missing-field error.
    pub fn missing_field(kind: u8, index: usize, actual: usize) -> Self {
        Self::MissingField {
            kind,
            index,
            actual,
        }
    }

    /// Create a bad-field-width error.
    pub fn bad_field_width(index: usize, expected: usize, actual: usize) -> Self {
        Self::BadFieldWidth {
            index,
            expected,
            actual,
        }
    }
}
