//! Incremental frame extraction.
//!
//! Socket reads do not align with frame boundaries, so both ends feed
//! raw bytes into a [`FrameReader`] and take complete frames out as the
//! end marker arrives. Surplus bytes after a frame are retained for the
//! next one. This replaces any reliance on transport buffering timing
//! as a boundary signal.

use crate::frame::END;

/// Accumulates raw bytes and yields one complete frame at a time.
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: Vec<u8>,
}

impl FrameReader {
    /// Creates an empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes received from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Takes the next complete frame out of the buffer, end marker
    /// included, or returns `None` if no full frame has arrived yet.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let end = find_end(&self.buffer)?;
        let boundary = end + END.len();
        let rest = self.buffer.split_off(boundary);
        let frame = std::mem::replace(&mut self.buffer, rest);
        Some(frame)
    }

    /// Number of buffered bytes not yet part of a yielded frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_end(buffer: &[u8]) -> Option<usize> {
    if buffer.len() < END.len() {
        return None;
    }
    (0..=buffer.len() - END.len()).find(|&i| &buffer[i..i + END.len()] == END)
}
