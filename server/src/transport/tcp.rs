use std::{
    io,
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    os::fd::{AsFd, BorrowedFd},
};

use nix::sys::socket::{AddressFamily, SockaddrStorage};

use super::{listener::listen_stream, ClientSocket, ListenAddr, PeerIdentity, Transport};
use crate::error::OpusServerError;

/// TCP listener. Peers are always [`PeerIdentity::UNKNOWN`].
pub struct TcpTransport {
    listener: Option<TcpListener>,
    addr: ListenAddr,
}

impl TcpTransport {
    pub fn bind(host_port: &str, backlog: i32) -> Result<Self, OpusServerError> {
        let socket_addr = resolve(host_port)?;
        let family = match socket_addr {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        };
        let sockaddr = SockaddrStorage::from(socket_addr);
        let fd = listen_stream(family, &sockaddr, backlog, host_port)?;

        let listener = TcpListener::from(fd);
        listener.set_nonblocking(true)?;

        // port 0 binds an ephemeral port; report the real one
        let bound = listener.local_addr()?;

        Ok(Self {
            listener: Some(listener),
            addr: ListenAddr::tcp(bound.to_string()),
        })
    }
}

fn resolve(host_port: &str) -> Result<SocketAddr, OpusServerError> {
    host_port
        .to_socket_addrs()
        .map_err(|err| OpusServerError::InvalidAddress {
            addr: host_port.to_string(),
            reason: err.to_string(),
        })?
        .next()
        .ok_or_else(|| OpusServerError::InvalidAddress {
            addr: host_port.to_string(),
            reason: "host resolved to no addresses".to_string(),
        })
}

impl Transport for TcpTransport {
    fn accept(&mut self) -> io::Result<Option<(Box<dyn ClientSocket>, PeerIdentity)>> {
        let Some(listener) = &self.listener else {
            return Ok(None);
        };
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                let socket: Box<dyn ClientSocket> = Box::new(stream);
                Ok(Some((socket, PeerIdentity::UNKNOWN)))
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn listener_fd(&self) -> Option<BorrowedFd<'_>> {
        self.listener.as_ref().map(|listener| listener.as_fd())
    }

    fn local_addr(&self) -> &ListenAddr {
        &self.addr
    }

    fn close(&mut self) {
        self.listener = None;
    }
}
