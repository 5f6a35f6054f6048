use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::OpusClientError;

/// Where the collector (or its control channel) listens
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerAddr {
    Unix(PathBuf),
    Tcp(String),
}

impl FromStr for ServerAddr {
    type Err = OpusClientError;

    fn from_str(addr: &str) -> Result<Self, Self::Err> {
        if let Some(path) = addr.strip_prefix("unix://") {
            if !path.is_empty() {
                return Ok(ServerAddr::Unix(PathBuf::from(path)));
            }
        } else if let Some(host_port) = addr.strip_prefix("tcp://") {
            if host_port.rsplit_once(':').is_some() {
                return Ok(ServerAddr::Tcp(host_port.to_string()));
            }
        }
        Err(OpusClientError::InvalidAddress {
            addr: addr.to_string(),
        })
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Unix(path) => write!(f, "unix://{}", path.display()),
            ServerAddr::Tcp(host_port) => write!(f, "tcp://{}", host_port),
        }
    }
}
