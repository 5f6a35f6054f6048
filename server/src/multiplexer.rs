use std::{
    collections::{BTreeMap, HashMap},
    os::fd::RawFd,
    time::Duration,
};

use log::{debug, error, info, warn};
use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags, PollTimeout},
};

use opus_shared::{GenericMessage, RawMessage, MAX_PAYLOAD_SIZE};

use crate::{
    connection::{
        connection_entry::ConnectionEntry, connection_reader::ReadStatus, owner_index::OwnerIndex,
    },
    error::OpusServerError,
    server::ServerConfig,
    transport::{self, ListenAddr, Transport},
};

/// Result of [`Multiplexer::detach`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DetachResult {
    pub closed: usize,
    pub events: Vec<RawMessage>,
}

#[derive(Clone, Copy, Debug)]
enum Token {
    Listener,
    Client(RawFd),
}

/// Owns the listening socket and every accepted connection.
///
/// All state is touched only by the thread calling [`Multiplexer::poll`];
/// other threads reach it through the command bridge.
pub struct Multiplexer {
    transport: Box<dyn Transport>,
    connections: HashMap<RawFd, ConnectionEntry>,
    owners: OwnerIndex,
    poll_timeout: Duration,
    max_payload_len: usize,
}

impl Multiplexer {
    /// Binds the configured address and starts listening.
    pub fn bind(config: &ServerConfig) -> Result<Self, OpusServerError> {
        config.validate()?;
        let transport = transport::bind(config)?;
        info!("collector listening on {}", transport.local_addr());
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport(transport: Box<dyn Transport>, config: &ServerConfig) -> Self {
        Self {
            transport,
            connections: HashMap::new(),
            owners: OwnerIndex::new(),
            poll_timeout: config.poll_timeout,
            max_payload_len: config.max_payload_len.min(MAX_PAYLOAD_SIZE),
        }
    }

    pub fn local_addr(&self) -> &ListenAddr {
        self.transport.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// One readiness wait plus the work it uncovered. Returns completed
    /// messages, including synthesized disconnects, in completion order.
    pub fn poll(&mut self) -> Result<Vec<RawMessage>, OpusServerError> {
        let ready = self.wait_ready()?;
        let mut messages = Vec::new();

        for (token, flags) in ready {
            match token {
                Token::Listener => self.accept_pending(),
                Token::Client(fd) => self.service(fd, flags, &mut messages),
            }
        }

        Ok(messages)
    }

    /// Owner pid to live connection count
    pub fn ps(&self) -> BTreeMap<i32, usize> {
        self.owners.counts()
    }

    /// Closes every connection owned by `pid`. Unknown pids close nothing.
    pub fn detach(&mut self, pid: i32) -> DetachResult {
        let fds = self.owners.connections(pid).to_vec();
        let mut result = DetachResult::default();

        for fd in fds {
            if self.connections.contains_key(&fd) {
                result.closed += 1;
            }
            result.events.extend(self.teardown(fd));
        }

        if result.closed > 0 {
            info!("detached pid {}: {} connections closed", pid, result.closed);
        }
        result
    }

    /// Tears down every connection and the listening socket. Returns the
    /// disconnect notifications this produced.
    pub fn close(&mut self) -> Vec<RawMessage> {
        let fds: Vec<RawFd> = self.connections.keys().copied().collect();
        let mut events = Vec::new();
        for fd in fds {
            events.extend(self.teardown(fd));
        }
        self.owners.clear();
        self.transport.close();
        info!("collector on {} closed", self.transport.local_addr());
        events
    }

    // Private

    fn wait_ready(&self) -> Result<Vec<(Token, PollFlags)>, OpusServerError> {
        let mut tokens = Vec::with_capacity(self.connections.len() + 1);
        let mut poll_fds = Vec::with_capacity(self.connections.len() + 1);

        if let Some(fd) = self.transport.listener_fd() {
            tokens.push(Token::Listener);
            poll_fds.push(PollFd::new(fd, PollFlags::POLLIN));
        }
        for (fd, entry) in &self.connections {
            tokens.push(Token::Client(*fd));
            poll_fds.push(PollFd::new(entry.borrow_fd(), PollFlags::POLLIN));
        }

        match poll(&mut poll_fds, self.timeout()) {
            Ok(0) | Err(Errno::EINTR) => return Ok(Vec::new()),
            Ok(_) => {}
            Err(errno) => return Err(OpusServerError::Poll(errno)),
        }

        Ok(tokens
            .into_iter()
            .zip(poll_fds.iter())
            .filter_map(|(token, poll_fd)| match poll_fd.revents() {
                Some(flags) if !flags.is_empty() => Some((token, flags)),
                _ => None,
            })
            .collect())
    }

    fn timeout(&self) -> PollTimeout {
        let millis = i32::try_from(self.poll_timeout.as_millis()).unwrap_or(i32::MAX);
        PollTimeout::try_from(millis).unwrap_or(PollTimeout::from(u16::MAX))
    }

    fn accept_pending(&mut self) {
        loop {
            match self.transport.accept() {
                Ok(Some((socket, owner))) => {
                    let entry = ConnectionEntry::new(socket, owner, self.max_payload_len);
                    let fd = entry.fd();
                    debug!("accepted fd {} from {}", fd, owner);
                    self.owners.insert(owner.pid, fd);
                    self.connections.insert(fd, entry);
                }
                Ok(None) => return,
                Err(err) => {
                    warn!("accept failed: {}", err);
                    return;
                }
            }
        }
    }

    fn service(&mut self, fd: RawFd, flags: PollFlags, out: &mut Vec<RawMessage>) {
        let Some(entry) = self.connections.get_mut(&fd) else {
            return;
        };

        if !flags.contains(PollFlags::POLLIN) {
            if flags.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
                debug!("fd {} hung up", fd);
                out.extend(self.teardown(fd));
            }
            return;
        }

        match entry.pull() {
            Ok(ReadStatus::Message(message)) => out.push(message),
            Ok(ReadStatus::Retry) => {}
            Ok(ReadStatus::ConnectionClosed) => {
                debug!("fd {} closed by peer", fd);
                out.extend(self.teardown(fd));
            }
            Err(err) => {
                warn!("dropping fd {} from {}: {}", fd, entry.owner(), err);
                out.extend(self.teardown(fd));
            }
        }
    }

    /// Forgets `fd` and closes its socket. Yields a disconnect notification
    /// when it was its owner's last connection.
    fn teardown(&mut self, fd: RawFd) -> Option<RawMessage> {
        let entry = self.connections.remove(&fd)?;
        let owner = entry.owner();
        if entry.has_partial() {
            debug!("fd {} closed with a partial message buffered", fd);
        }
        drop(entry);

        if !self.owners.remove(owner.pid, fd) {
            return None;
        }

        match RawMessage::from_payload(owner.pid, owner.pid, &GenericMessage::disconnect(fd)) {
            Ok(message) => Some(message),
            Err(err) => {
                error!("could not build disconnect notification for pid {}: {}", owner.pid, err);
                None
            }
        }
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.transport.close();
    }
}
