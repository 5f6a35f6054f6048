use crate::header::{MessageHeader, HEADER_SIZE};

/// Builds wire frames, reusing one output buffer across calls.
pub struct Encoder {
    result: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { result: Vec::new() }
    }

    /// Header bytes followed by the payload. The header is written as given;
    /// callers keep `payload_len` consistent with `payload`.
    pub fn encode(&mut self, header: &MessageHeader, payload: &[u8]) -> &[u8] {
        self.result.clear();
        self.result.reserve(HEADER_SIZE + payload.len());
        self.result.extend_from_slice(&header.to_bytes());
        self.result.extend_from_slice(payload);
        &self.result
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
