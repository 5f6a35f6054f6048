use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::OpusServerError;

const UNIX_SCHEME: &str = "unix://";
const TCP_SCHEME: &str = "tcp://";

/// Address a collector or control listener binds, written `unix://<path>` or
/// `tcp://<host>:<port>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ListenAddr {
    Unix(PathBuf),
    Tcp(String),
}

impl ListenAddr {
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        ListenAddr::Unix(path.into())
    }

    pub fn tcp(host_port: impl Into<String>) -> Self {
        ListenAddr::Tcp(host_port.into())
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            ListenAddr::Unix(_) => "unix",
            ListenAddr::Tcp(_) => "tcp",
        }
    }
}

impl FromStr for ListenAddr {
    type Err = OpusServerError;

    fn from_str(addr: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| OpusServerError::InvalidAddress {
            addr: addr.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = addr.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(ListenAddr::Unix(PathBuf::from(path)));
        }

        if let Some(host_port) = addr.strip_prefix(TCP_SCHEME) {
            let (host, port) = host_port
                .rsplit_once(':')
                .ok_or_else(|| invalid("expected host:port"))?;
            if host.is_empty() {
                return Err(invalid("empty host"));
            }
            port.parse::<u16>()
                .map_err(|_| invalid("port is not a number in 0..=65535"))?;
            return Ok(ListenAddr::Tcp(host_port.to_string()));
        }

        Err(invalid("unknown scheme, expected unix:// or tcp://"))
    }
}

impl TryFrom<String> for ListenAddr {
    type Error = OpusServerError;

    fn try_from(addr: String) -> Result<Self, Self::Error> {
        addr.parse()
    }
}

impl From<ListenAddr> for String {
    fn from(addr: ListenAddr) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddr::Unix(path) => write!(f, "{}{}", UNIX_SCHEME, path.display()),
            ListenAddr::Tcp(host_port) => write!(f, "{}{}", TCP_SCHEME, host_port),
        }
    }
}
