use std::{
    io::{self, Read},
    os::fd::{AsFd, BorrowedFd},
};

mod channel;
mod listen_addr;
mod listener;
mod peer;
mod tcp;
pub(crate) mod unix;

pub use channel::{BatchChannel, BatchReceiver, BatchSender, RecvError, SendError};
pub use listen_addr::ListenAddr;
pub use peer::PeerIdentity;
pub use tcp::TcpTransport;
pub use unix::UnixTransport;

use crate::{error::OpusServerError, server::ServerConfig};

/// An accepted client stream the multiplexer can poll and read.
pub trait ClientSocket: Read + AsFd + Send {}

impl<T: Read + AsFd + Send> ClientSocket for T {}

/// One listening endpoint per transport family.
pub trait Transport: Send {
    /// Accepts one pending connection, already switched to non-blocking
    /// mode. `Ok(None)` when nothing is pending.
    fn accept(&mut self) -> io::Result<Option<(Box<dyn ClientSocket>, PeerIdentity)>>;

    /// Descriptor to wait on for incoming connections, `None` once closed
    fn listener_fd(&self) -> Option<BorrowedFd<'_>>;

    fn local_addr(&self) -> &ListenAddr;

    /// Releases the listening socket and anything bound to its address
    fn close(&mut self);
}

/// Binds the transport family named by `config.listen_addr`.
pub fn bind(config: &ServerConfig) -> Result<Box<dyn Transport>, OpusServerError> {
    match &config.listen_addr {
        ListenAddr::Unix(path) => Ok(Box::new(UnixTransport::bind(path, config.backlog)?)),
        ListenAddr::Tcp(host_port) => Ok(Box::new(TcpTransport::bind(host_port, config.backlog)?)),
    }
}
