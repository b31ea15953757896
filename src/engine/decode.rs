//! Byte-to-record decoding
//!
//! Turns an arbitrary sequence of byte chunks into complete text lines,
//! carrying the incomplete trailing fragment across chunk boundaries. The
//! carry-over is kept as raw bytes so a UTF-8 sequence split across chunks
//! is reassembled before decoding; malformed bytes become U+FFFD and are
//! never propagated as errors.

/// Incremental splitter turning byte chunks into complete text lines
///
/// Bound to one transport session; not restartable.
#[derive(Debug, Default)]
pub struct LineDecoder {
    carry: Vec<u8>,
}

impl LineDecoder {
    /// Create a decoder with an empty carry-over
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every line it completes
    ///
    /// Lines are returned in stream order with the trailing newline (and a
    /// preceding `\r`, if any) removed. The final unterminated segment is
    /// retained for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let rest = self.carry.split_off(pos + 1);
            let mut segment = std::mem::replace(&mut self.carry, rest);
            segment.pop();
            if segment.last() == Some(&b'\r') {
                segment.pop();
            }
            lines.push(String::from_utf8_lossy(&segment).into_owned());
        }
        lines
    }

    /// Consume the decoder at end of stream, surfacing any leftover content
    ///
    /// An empty or whitespace-only carry-over is discarded. Non-whitespace
    /// content is returned so the caller can treat it as an implicitly
    /// terminated final record (and report the anomaly).
    pub fn finish(self) -> Option<String> {
        let leftover = String::from_utf8_lossy(&self.carry);
        if leftover.trim().is_empty() {
            None
        } else {
            Some(leftover.into_owned())
        }
    }
}
