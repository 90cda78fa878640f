//! # Filepost Protocol
//!
//! Wire protocol shared by the filepost server and client.
//!
//! This crate provides:
//! - Typed request and response messages ([`Request`], [`Response`])
//! - The delimiter framing codec (`<EOM>` field separator, `<EOF>`
//!   terminator)
//! - An incremental [`FrameReader`] for extracting frames from a byte
//!   stream
//!
//! ## Frame layout
//!
//! ```text
//! client_id <EOM> kind_byte <EOM> field_2 <EOM> ... <EOF>
//! ```
//!
//! The kind byte (values 0–5) selects the message layout. Responses
//! reuse the kind number of the request they answer and carry a
//! little-endian `i16` status code, except the version response which
//! transmits none (its accessor reports the `-1` sentinel).
//!
//! Markers are not escaped: payloads containing the marker byte
//! sequences are outside the protocol's contract.
//!
//! ## Usage
//!
//! ```
//! use filepost_protocol::Request;
//!
//! let request = Request::Auth {
//!     client_id: "alice".into(),
//!     password_hash: "AB12".into(),
//! };
//! let frame = request.encode();
//! assert_eq!(Request::decode(&frame).unwrap(), request);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod frame;
mod message;
mod reader;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{encode_fields, split_fields, DELIMITER, END};
pub use message::{kind, status, Request, Response};
pub use reader::FrameReader;
