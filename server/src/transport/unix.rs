use std::{
    fs, io,
    os::{
        fd::{AsFd, BorrowedFd},
        unix::{fs::FileTypeExt, net::UnixListener},
    },
    path::{Path, PathBuf},
};

use log::{debug, warn};
use nix::sys::socket::{AddressFamily, UnixAddr};

use super::{listener::listen_stream, ClientSocket, ListenAddr, PeerIdentity, Transport};
use crate::error::OpusServerError;

pub struct UnixTransport {
    listener: Option<UnixListener>,
    path: PathBuf,
    addr: ListenAddr,
}

impl UnixTransport {
    pub fn bind(path: &Path, backlog: i32) -> Result<Self, OpusServerError> {
        let addr = ListenAddr::unix(path);
        let display = addr.to_string();

        remove_stale_socket(path)?;

        let sockaddr = UnixAddr::new(path).map_err(|source| OpusServerError::Listen {
            op: "address",
            addr: display.clone(),
            source,
        })?;
        let fd = listen_stream(AddressFamily::Unix, &sockaddr, backlog, &display)?;

        let listener = UnixListener::from(fd);
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener: Some(listener),
            path: path.to_path_buf(),
            addr,
        })
    }
}

impl Transport for UnixTransport {
    fn accept(&mut self) -> io::Result<Option<(Box<dyn ClientSocket>, PeerIdentity)>> {
        let Some(listener) = &self.listener else {
            return Ok(None);
        };
        match listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                let peer = PeerIdentity::from_unix(&stream);
                let socket: Box<dyn ClientSocket> = Box::new(stream);
                Ok(Some((socket, peer)))
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
        if self.listener.take().is_none() {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!("failed to remove socket {}: {}", self.path.display(), err);
            }
        }
    }
}

impl Drop for UnixTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Removes a socket file left behind by a previous run. Anything at `path`
/// that is not a socket is left alone and reported.
pub(crate) fn remove_stale_socket(path: &Path) -> Result<(), OpusServerError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    if !metadata.file_type().is_socket() {
        return Err(OpusServerError::InvalidAddress {
            addr: path.display().to_string(),
            reason: "path exists and is not a socket".to_string(),
        });
    }

    fs::remove_file(path)?;
    debug!("removed stale socket {}", path.display());
    Ok(())
}
