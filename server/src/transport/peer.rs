use std::{fmt, os::unix::net::UnixStream};

/// Identity of the process on the other end of a connection, captured once
/// at accept time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    pub pid: i32,
    pub uid: u32,
    pub gid: u32,
}

impl PeerIdentity {
    /// Reported for peers the OS cannot identify, i.e. every TCP client
    pub const UNKNOWN: PeerIdentity = PeerIdentity {
        pid: -1,
        uid: u32::MAX,
        gid: u32::MAX,
    };

    pub fn new(pid: i32, uid: u32, gid: u32) -> Self {
        Self { pid, uid, gid }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }

    /// Reads `SO_PEERCRED` from a connected UNIX-domain stream.
    pub fn from_unix(stream: &UnixStream) -> Self {
        peer_credentials(stream)
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "pid {} (uid {}, gid {})", self.pid, self.uid, self.gid)
        } else {
            f.write_str("unknown peer")
        }
    }
}

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        use log::warn;
        use nix::sys::socket::{getsockopt, sockopt};

        fn peer_credentials(stream: &UnixStream) -> PeerIdentity {
            match getsockopt(stream, sockopt::PeerCredentials) {
                Ok(creds) => PeerIdentity::new(creds.pid(), creds.uid(), creds.gid()),
                Err(errno) => {
                    warn!("could not read peer credentials: {}", errno);
                    PeerIdentity::UNKNOWN
                }
            }
        }
    } else {
        fn peer_credentials(_: &UnixStream) -> PeerIdentity {
            PeerIdentity::UNKNOWN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn socketpair_reports_our_own_pid() {
        let (left, _right) = UnixStream::pair().expect("socketpair");
        let identity = PeerIdentity::from_unix(&left);
        assert_eq!(identity.pid, std::process::id() as i32);
        assert!(identity.is_known());
    }

    #[test]
    fn unknown_sentinel_displays_plainly() {
        assert_eq!(PeerIdentity::UNKNOWN.to_string(), "unknown peer");
    }
}
