//! Delimiter framing.
//!
//! A frame is a sequence of opaque byte fields joined by [`DELIMITER`]
//! and terminated by [`END`]:
//!
//! ```text
//! field_0 <EOM> field_1 <EOM> ... field_n <EOF>
//! ```
//!
//! Neither marker is escaped; payloads containing the marker byte
//! sequences are outside the protocol's contract.

use crate::error::{ProtocolError, ProtocolResult};

/// Separates fields within a frame.
pub const DELIMITER: &[u8] = b"<EOM>";

/// Terminates a frame.
pub const END: &[u8] = b"<EOF>";

/// Encode fields into a single frame, end marker included.
pub fn encode_fields(fields: &[&[u8]]) -> Vec<u8> {
    let body_len: usize = fields.iter().map(|f| f.len()).sum();
    let mut frame =
        Vec::with_capacity(body_len + fields.len().saturating_sub(1) * DELIMITER.len() + END.len());

    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            frame.extend_from_slice(DELIMITER);
        }
        frame.extend_from_slice(field);
    }
    frame.extend_from_slice(END);
    frame
}

/// Split a raw buffer into its fields.
///
/// The buffer is first cut at the first occurrence of [`END`]; bytes
/// after the marker are ignored, so exactly one message is decoded per
/// call. The remaining segment is then split on [`DELIMITER`].
///
/// # Errors
///
/// Returns [`ProtocolError::MissingEndMarker`] if the buffer holds no
/// end marker, and [`ProtocolError::EmptyFrame`] for a frame whose body
/// is empty.
pub fn split_fields(buffer: &[u8]) -> ProtocolResult<Vec<&[u8]>> {
    let end = find(buffer, END, 0).ok_or(ProtocolError::MissingEndMarker)?;
    let body = &buffer[..end];
    if body.is_empty() {
        return Err(ProtocolError::EmptyFrame);
    }

    let mut fields = Vec::new();
    let mut start = 0;
    while let Some(at) = find(body, DELIMITER, start) {
        fields.push(&body[start..at]);
        start = at + DELIMITER.len();
    }
    fields.push(&body[start..]);
    Ok(fields)
}

/// Find `needle` in `haystack` at or after `from`, scanning
/// byte-for-byte for the needle's first byte and verifying the full
/// marker at that offset.
fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}
