use crate::{
    constants::MAX_PAYLOAD_SIZE,
    header::{MessageHeader, HEADER_SIZE},
    messages::raw_message::RawMessage,
};

use super::error::FramingError;

/// Where a [`Decoder`] is in the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    AwaitingHeader,
    AwaitingPayload,
}

/// Incremental framer for one ingestion connection.
///
/// Performs no I/O. The caller reads into [`Decoder::spare_mut`], which is
/// exactly the number of bytes still missing from the current header or
/// payload, then reports the count through [`Decoder::advance`]. Since no
/// read can span two messages, bytes belonging to the next message are never
/// consumed early and the result is independent of how the stream was split.
pub struct Decoder {
    state: DecodeState,
    header_buf: [u8; HEADER_SIZE],
    header_filled: usize,
    payload: Vec<u8>,
    payload_filled: usize,
    max_payload_len: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_payload_len(MAX_PAYLOAD_SIZE)
    }

    /// Decoder refusing payloads above `max_payload_len`. The limit never
    /// exceeds `MAX_PAYLOAD_SIZE`.
    pub fn with_max_payload_len(max_payload_len: usize) -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            header_buf: [0; HEADER_SIZE],
            header_filled: 0,
            payload: Vec::new(),
            payload_filled: 0,
            max_payload_len: max_payload_len.min(MAX_PAYLOAD_SIZE),
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    /// True when no bytes of a partial message are buffered
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::AwaitingHeader && self.header_filled == 0
    }

    /// Bytes still missing from the piece currently being assembled
    pub fn remaining(&self) -> usize {
        match self.state {
            DecodeState::AwaitingHeader => HEADER_SIZE - self.header_filled,
            DecodeState::AwaitingPayload => self.payload.len() - self.payload_filled,
        }
    }

    /// Buffer the next read should land in. Never empty.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        match self.state {
            DecodeState::AwaitingHeader => &mut self.header_buf[self.header_filled..],
            DecodeState::AwaitingPayload => &mut self.payload[self.payload_filled..],
        }
    }

    /// Records that `count` bytes were written into the last [`Decoder::spare_mut`].
    ///
    /// Returns a message once its final byte arrives. A header whose declared
    /// length exceeds the ceiling is rejected here, before any of its payload
    /// is requested, and the decoder is reset.
    pub fn advance(&mut self, count: usize) -> Result<Option<RawMessage>, FramingError> {
        let available = self.remaining();
        if count > available {
            return Err(FramingError::Overrun {
                advanced: count,
                available,
            });
        }

        match self.state {
            DecodeState::AwaitingHeader => {
                self.header_filled += count;
                if self.header_filled < HEADER_SIZE {
                    return Ok(None);
                }

                let header = MessageHeader::from_array(&self.header_buf);
                let declared = header.payload_len();
                if declared > self.max_payload_len {
                    self.reset();
                    return Err(FramingError::PayloadTooLarge {
                        declared,
                        max: self.max_payload_len,
                    });
                }

                self.payload = vec![0; declared];
                self.payload_filled = 0;
                self.state = DecodeState::AwaitingPayload;

                if declared == 0 {
                    return Ok(Some(self.take_message()));
                }
                Ok(None)
            }
            DecodeState::AwaitingPayload => {
                self.payload_filled += count;
                if self.payload_filled < self.payload.len() {
                    return Ok(None);
                }
                Ok(Some(self.take_message()))
            }
        }
    }

    /// Copies as much of `bytes` as the current piece needs.
    ///
    /// Returns how many bytes were consumed and the message they completed, if
    /// any. Callers with a larger buffer loop until it is drained.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(usize, Option<RawMessage>), FramingError> {
        let spare = self.spare_mut();
        let count = spare.len().min(bytes.len());
        spare[..count].copy_from_slice(&bytes[..count]);
        let message = self.advance(count)?;
        Ok((count, message))
    }

    fn take_message(&mut self) -> RawMessage {
        let payload = std::mem::take(&mut self.payload);
        let message = RawMessage::from_parts(self.header_buf, payload);
        self.reset();
        message
    }

    fn reset(&mut self) {
        self.state = DecodeState::AwaitingHeader;
        self.header_filled = 0;
        self.payload = Vec::new();
        self.payload_filled = 0;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
