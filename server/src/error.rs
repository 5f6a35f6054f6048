use std::{io, time::Duration};

use nix::errno::Errno;
use thiserror::Error;

use opus_shared::ControlError;

/// Errors surfaced by the collector to whoever started it
#[derive(Debug, Error)]
pub enum OpusServerError {
    /// Listen address string could not be understood
    #[error("Invalid listen address '{addr}': {reason}")]
    InvalidAddress {
        addr: String,
        reason: String,
    },

    /// Configuration file could not be read or parsed
    #[error("Invalid server configuration: {reason}")]
    Config {
        reason: String,
    },

    /// Creating, binding or listening on the collector socket failed
    #[error("Failed to {op} listening socket {addr}: {source}")]
    Listen {
        op: &'static str,
        addr: String,
        #[source]
        source: Errno,
    },

    /// Readiness wait failed for a reason other than interruption
    #[error("Readiness wait failed: {0}. The collector cannot make progress")]
    Poll(#[source] Errno),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Control channel error: {0}")]
    Control(#[from] ControlError),

    /// Worker thread panicked before it could report a result
    #[error("Ingestion worker thread panicked")]
    WorkerPanicked,
}

/// Errors from submitting a command through the [`crate::CommandBridge`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Another command held the slot for longer than the configured ceiling
    #[error("Command bridge busy for {waited:?}; another command is still in flight")]
    Contention {
        waited: Duration,
    },

    /// The worker has shut down and will not service further commands
    #[error("Ingestion worker has stopped")]
    Closed,

    /// A thread panicked while holding the bridge lock
    #[error("Command bridge lock poisoned")]
    Poisoned,
}
