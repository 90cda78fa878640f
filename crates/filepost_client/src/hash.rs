//! Password hashing.

use sha2::{Digest, Sha512};
use std::fmt::Write;

/// SHA-512 digest of `input`, rendered as uppercase hex.
///
/// Passwords never travel in the clear; the client hashes before the
/// auth frame is built and the server stores only this form.
pub fn sha512_hex(input: &str) -> String {
    let digest = Sha512::digest(input.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02X}");
    }
    out
}
