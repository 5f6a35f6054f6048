use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use opus_shared::FramingError;

use super::connection_reader::{ConnectionReader, ReadStatus};
use crate::transport::{ClientSocket, PeerIdentity};

/// One accepted client socket plus its identity and read state.
pub struct ConnectionEntry {
    socket: Box<dyn ClientSocket>,
    owner: PeerIdentity,
    reader: ConnectionReader,
}

impl ConnectionEntry {
    pub fn new(socket: Box<dyn ClientSocket>, owner: PeerIdentity, max_payload_len: usize) -> Self {
        Self {
            socket,
            owner,
            reader: ConnectionReader::new(max_payload_len),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_fd().as_raw_fd()
    }

    pub fn borrow_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    pub fn owner(&self) -> PeerIdentity {
        self.owner
    }

    pub fn pull(&mut self) -> Result<ReadStatus, FramingError> {
        self.reader.pull(&mut self.socket)
    }

    pub fn has_partial(&self) -> bool {
        self.reader.has_partial()
    }
}
