use std::io::{ErrorKind, Read};

use log::debug;

use opus_shared::{DecodeState, Decoder, FramingError, RawMessage};

/// Outcome of one [`ConnectionReader::pull`].
#[derive(Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// Socket has no more bytes right now; buffered bytes are kept
    Retry,
    /// Peer shut down or the socket failed; tear the connection down
    ConnectionClosed,
    Message(RawMessage),
}

/// Partial-read state machine for one client socket.
///
/// Reads never ask for more than the current header or payload still needs,
/// so one `pull` yields at most one message and never swallows the start of
/// the next.
pub struct ConnectionReader {
    decoder: Decoder,
}

impl ConnectionReader {
    pub fn new(max_payload_len: usize) -> Self {
        Self {
            decoder: Decoder::with_max_payload_len(max_payload_len),
        }
    }

    pub fn state(&self) -> DecodeState {
        self.decoder.state()
    }

    /// True if part of a message is buffered
    pub fn has_partial(&self) -> bool {
        !self.decoder.is_idle()
    }

    /// Reads until a message completes or the socket has nothing more.
    pub fn pull<R: Read + ?Sized>(&mut self, socket: &mut R) -> Result<ReadStatus, FramingError> {
        loop {
            match socket.read(self.decoder.spare_mut()) {
                Ok(0) => return Ok(ReadStatus::ConnectionClosed),
                Ok(count) => {
                    if let Some(message) = self.decoder.advance(count)? {
                        return Ok(ReadStatus::Message(message));
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(ReadStatus::Retry),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!("client read failed: {}", err);
                    return Ok(ReadStatus::ConnectionClosed);
                }
            }
        }
    }
}
