use std::os::fd::{AsRawFd, OwnedFd};

use nix::{
    errno::Errno,
    sys::socket::{
        bind, listen, setsockopt, socket, sockopt, AddressFamily, Backlog, SockFlag, SockType,
        SockaddrLike,
    },
};

use crate::error::OpusServerError;

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        fn socket_flags() -> SockFlag {
            SockFlag::SOCK_CLOEXEC
        }
    } else {
        fn socket_flags() -> SockFlag {
            SockFlag::empty()
        }
    }
}

fn listen_error<'a>(op: &'static str, addr: &'a str) -> impl Fn(Errno) -> OpusServerError + 'a {
    move |source| OpusServerError::Listen {
        op,
        addr: addr.to_string(),
        source,
    }
}

/// Creates a bound, listening stream socket with an explicit backlog.
pub(crate) fn listen_stream(
    family: AddressFamily,
    addr: &dyn SockaddrLike,
    backlog: i32,
    display: &str,
) -> Result<OwnedFd, OpusServerError> {
    let fd = socket(family, SockType::Stream, socket_flags(), None)
        .map_err(listen_error("create", display))?;

    if family != AddressFamily::Unix {
        setsockopt(&fd, sockopt::ReuseAddr, &true).map_err(listen_error("configure", display))?;
    }

    bind(fd.as_raw_fd(), addr).map_err(listen_error("bind", display))?;

    let backlog = Backlog::new(backlog).map_err(listen_error("listen", display))?;
    listen(&fd, backlog).map_err(listen_error("listen", display))?;

    Ok(fd)
}
