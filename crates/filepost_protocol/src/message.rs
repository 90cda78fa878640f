//! Typed protocol messages.
//!
//! Requests travel client → server, responses server → client. A
//! response reuses the kind number of the request it answers. All
//! messages are immutable values constructed once per encode or decode.
//!
//! Field layout is shared by every message: `client_id`, then a single
//! kind byte, then kind-specific fields. Numeric fields are
//! little-endian.

use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{encode_fields, split_fields};

/// Message kind bytes.
pub mod kind {
    /// Authentication request.
    pub const AUTH: u8 = 0;
    /// File upload.
    pub const SEND_FILE: u8 = 1;
    /// Request the server log for editing.
    pub const LOG_REQUEST: u8 = 2;
    /// Submit edited log contents.
    pub const LOG_CHANGES: u8 = 3;
    /// Ask for the server's running version.
    pub const VERSION_QUERY: u8 = 4;
    /// Graceful disconnect.
    pub const END_CONNECTION: u8 = 5;
}

/// Protocol status codes carried in responses.
pub mod status {
    /// Request succeeded.
    pub const OK: i16 = 200;
    /// Malformed request or version mismatch.
    pub const BAD_REQUEST: i16 = 400;
    /// Authentication failure or insufficient role.
    pub const FORBIDDEN: i16 = 403;
    /// Connection capacity reached.
    pub const TOO_MANY_CONNECTIONS: i16 = 429;
    /// Internal failure while persisting.
    pub const INTERNAL_ERROR: i16 = 500;
    /// Sentinel for responses that carry no status on the wire.
    pub const NONE: i16 = -1;
}

/// A client-originated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Authenticate with an identifier and a password hash.
    Auth {
        /// Client identifier.
        client_id: String,
        /// Hash of the client's password.
        password_hash: String,
    },
    /// Upload a file to the server.
    SendFile {
        /// Client identifier.
        client_id: String,
        /// Name to store the file under.
        file_name: String,
        /// Declared payload size in bytes.
        file_size: i32,
        /// File contents.
        file_data: Vec<u8>,
        /// Server version the upload targets.
        server_version: u8,
    },
    /// Request the server log for editing (admin only).
    LogRequest {
        /// Client identifier.
        client_id: String,
    },
    /// Submit edited log contents (admin only).
    LogChanges {
        /// Client identifier.
        client_id: String,
        /// Replacement log contents.
        log_data: Vec<u8>,
    },
    /// Ask for the server's running version.
    VersionQuery {
        /// Client identifier.
        client_id: String,
    },
    /// Close the connection.
    EndConnection {
        /// Client identifier.
        client_id: String,
    },
}

impl Request {
    /// Returns the kind byte of this request.
    pub fn kind(&self) -> u8 {
        match self {
            Request::Auth { .. } => kind::AUTH,
            Request::SendFile { .. } => kind::SEND_FILE,
            Request::LogRequest { .. } => kind::LOG_REQUEST,
            Request::LogChanges { .. } => kind::LOG_CHANGES,
            Request::VersionQuery { .. } => kind::VERSION_QUERY,
            Request::EndConnection { .. } => kind::END_CONNECTION,
        }
    }

    /// Returns the client identifier carried by this request.
    pub fn client_id(&self) -> &str {
        match self {
            Request::Auth { client_id, .. }
            | Request::SendFile { client_id, .. }
            | Request::LogRequest { client_id }
            | Request::LogChanges { client_id, .. }
            | Request::VersionQuery { client_id }
            | Request::EndConnection { client_id } => client_id,
        }
    }

    /// Encodes this request into a complete frame.
    pub fn encode(&self) -> Vec<u8> {
        let kind = [self.kind()];
        match self {
            Request::Auth {
                client_id,
                password_hash,
            } => encode_fields(&[client_id.as_bytes(), &kind, password_hash.as_bytes()]),
            Request::SendFile {
                client_id,
                file_name,
                file_size,
                file_data,
                server_version,
            } => encode_fields(&[
                client_id.as_bytes(),
                &kind,
                file_name.as_bytes(),
                &file_size.to_le_bytes(),
                file_data,
                &[*server_version],
            ]),
            Request::LogChanges {
                client_id,
                log_data,
            } => encode_fields(&[client_id.as_bytes(), &kind, log_data]),
            Request::LogRequest { client_id }
            | Request::VersionQuery { client_id }
            | Request::EndConnection { client_id } => {
                encode_fields(&[client_id.as_bytes(), &kind])
            }
        }
    }

    /// Decodes a request from a frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the frame is unterminated, a
    /// required field is missing or malformed, or the kind byte is
    /// unknown. Never panics on short input.
    pub fn decode(buffer: &[u8]) -> ProtocolResult<Self> {
        let fields = split_fields(buffer)?;
        let kind_byte = kind_of(&fields)?;
        let client_id = text_field(&fields, 0, kind_byte)?;

        match kind_byte {
            kind::AUTH => Ok(Request::Auth {
                client_id,
                password_hash: text_field(&fields, 2, kind_byte)?,
            }),
            kind::SEND_FILE => Ok(Request::SendFile {
                client_id,
                file_name: text_field(&fields, 2, kind_byte)?,
                file_size: i32::from_le_bytes(fixed_field::<4>(&fields, 3, kind_byte)?),
                file_data: raw_field(&fields, 4, kind_byte)?.to_vec(),
                server_version: byte_field(&fields, 5, kind_byte)?,
            }),
            kind::LOG_REQUEST => Ok(Request::LogRequest { client_id }),
            kind::LOG_CHANGES => Ok(Request::LogChanges {
                client_id,
                log_data: raw_field(&fields, 2, kind_byte)?.to_vec(),
            }),
            kind::VERSION_QUERY => Ok(Request::VersionQuery { client_id }),
            kind::END_CONNECTION => Ok(Request::EndConnection { client_id }),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// A server-originated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Status reply to a request (kinds 0, 1, 3 and 5, plus error
    /// replies to kind 2).
    Status {
        /// Client identifier the reply is addressed to.
        client_id: String,
        /// Kind of the request being answered.
        kind: u8,
        /// Protocol status code.
        status: i16,
    },
    /// Log contents reply to a successful log request (kind 2).
    LogData {
        /// Client identifier the reply is addressed to.
        client_id: String,
        /// Protocol status code.
        status: i16,
        /// Current log file contents.
        log_data: Vec<u8>,
    },
    /// Version reply (kind 4). Carries no status code on the wire.
    Version {
        /// Client identifier the reply is addressed to.
        client_id: String,
        /// Server's running version.
        version: u8,
    },
}

impl Response {
    /// Returns the kind byte of the request this response answers.
    pub fn kind(&self) -> u8 {
        match self {
            Response::Status { kind, .. } => *kind,
            Response::LogData { .. } => kind::LOG_REQUEST,
            Response::Version { .. } => kind::VERSION_QUERY,
        }
    }

    /// Returns the status code, or [`status::NONE`] for responses that
    /// do not transmit one.
    pub fn status(&self) -> i16 {
        match self {
            Response::Status { status, .. } | Response::LogData { status, .. } => *status,
            Response::Version { .. } => status::NONE,
        }
    }

    /// Encodes this response into a complete frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Status {
                client_id,
                kind,
                status,
            } => encode_fields(&[client_id.as_bytes(), &[*kind], &status.to_le_bytes()]),
            Response::LogData {
                client_id,
                status,
                log_data,
            } => encode_fields(&[
                client_id.as_bytes(),
                &[kind::LOG_REQUEST],
                &status.to_le_bytes(),
                log_data,
            ]),
            Response::Version { client_id, version } => encode_fields(&[
                client_id.as_bytes(),
                &[kind::VERSION_QUERY],
                &[*version],
            ]),
        }
    }

    /// Decodes a response from a frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] on unterminated, truncated or
    /// unrecognized input.
    pub fn decode(buffer: &[u8]) -> ProtocolResult<Self> {
        let fields = split_fields(buffer)?;
        let kind_byte = kind_of(&fields)?;
        let client_id = text_field(&fields, 0, kind_byte)?;

        match kind_byte {
            kind::AUTH | kind::SEND_FILE | kind::LOG_CHANGES | kind::END_CONNECTION => {
                Ok(Response::Status {
                    client_id,
                    kind: kind_byte,
                    status: i16::from_le_bytes(fixed_field::<2>(&fields, 2, kind_byte)?),
                })
            }
            kind::LOG_REQUEST => {
                let status = i16::from_le_bytes(fixed_field::<2>(&fields, 2, kind_byte)?);
                // Error replies to a log request come as a plain status
                // frame without the data field.
                match raw_field(&fields, 3, kind_byte) {
                    Ok(data) => Ok(Response::LogData {
                        client_id,
                        status,
                        log_data: data.to_vec(),
                    }),
                    Err(_) => Ok(Response::Status {
                        client_id,
                        kind: kind_byte,
                        status,
                    }),
                }
            }
            kind::VERSION_QUERY => Ok(Response::Version {
                client_id,
                version: byte_field(&fields, 2, kind_byte)?,
            }),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// Reads the kind byte from field 1.
fn kind_of(fields: &[&[u8]]) -> ProtocolResult<u8> {
    let field = fields
        .get(1)
        .ok_or_else(|| ProtocolError::missing_field(0, 1, fields.len()))?;
    field
        .first()
        .copied()
        .ok_or_else(|| ProtocolError::bad_field_width(1, 1, 0))
}

fn raw_field<'a>(fields: &[&'a [u8]], index: usize, kind: u8) -> ProtocolResult<&'a [u8]> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| ProtocolError::missing_field(kind, index, fields.len()))
}

fn text_field(fields: &[&[u8]], index: usize, kind: u8) -> ProtocolResult<String> {
    let raw = raw_field(fields, index, kind)?;
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8 { index })
}

fn byte_field(fields: &[&[u8]], index: usize, kind: u8) -> ProtocolResult<u8> {
    let raw = raw_field(fields, index, kind)?;
    raw.first()
        .copied()
        .ok_or_else(|| ProtocolError::bad_field_width(index, 1, 0))
}

fn fixed_field<const N: usize>(
    fields: &[&[u8]],
    index: usize,
    kind: u8,
) -> ProtocolResult<[u8; N]> {
    let raw = raw_field(fields, index, kind)?;
    raw.try_into()
        .map_err(|_| ProtocolError::bad_field_width(index, N, raw.len()))
}
