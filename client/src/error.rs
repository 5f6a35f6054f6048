use std::io;

use thiserror::Error;

use opus_shared::{ControlError, PayloadError};

#[derive(Debug, Error)]
pub enum OpusClientError {
    #[error("Invalid server address '{addr}'. Expected unix://<path> or tcp://<host>:<port>")]
    InvalidAddress {
        addr: String,
    },

    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    /// Payload exceeds what a header can declare
    #[error("Payload of {len} bytes does not fit in a message")]
    PayloadTooLarge {
        len: usize,
    },
}
