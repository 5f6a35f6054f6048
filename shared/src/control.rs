use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::constants::MAX_CONTROL_MESSAGE_SIZE;

/// Size of the length prefix in front of every control message.
pub const CONTROL_HEADER_SIZE: usize = 4;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Control channel I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Control message of {len} bytes exceeds the {max} byte limit")]
    TooLarge {
        len: usize,
        max: usize,
    },

    #[error("Malformed control message: {reason}")]
    Malformed {
        reason: String,
    },

    #[error("Peer closed the control channel")]
    PeerClosed,
}

/// Administrative request; only `cmd` and `pid` are interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
}

impl ControlRequest {
    pub fn ps() -> Self {
        Self {
            cmd: "ps".to_string(),
            pid: None,
        }
    }

    pub fn detach(pid: i32) -> Self {
        Self {
            cmd: "detach".to_string(),
            pid: Some(pid),
        }
    }

    pub fn status() -> Self {
        Self {
            cmd: "status".to_string(),
            pid: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerStatus {
    pub status: String,
    pub connections: usize,
    pub owners: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_map: Option<BTreeMap<i32, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<ProducerStatus>,
}

impl ControlResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn pid_map(pid_map: BTreeMap<i32, usize>) -> Self {
        Self {
            success: true,
            pid_map: Some(pid_map),
            ..Self::default()
        }
    }

    pub fn producer(producer: ProducerStatus) -> Self {
        Self {
            success: true,
            producer: Some(producer),
            ..Self::default()
        }
    }
}

/// Writes one length-prefixed JSON message.
pub fn write_control_message<W: Write, T: Serialize>(
    writer: &mut W,
    message: &T,
) -> Result<(), ControlError> {
    let body = serde_json::to_vec(message).map_err(|err| ControlError::Malformed {
        reason: err.to_string(),
    })?;
    if body.len() > MAX_CONTROL_MESSAGE_SIZE {
        return Err(ControlError::TooLarge {
            len: body.len(),
            max: MAX_CONTROL_MESSAGE_SIZE,
        });
    }

    let len = body.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Reads one length-prefixed JSON message, blocking until it is complete.
pub fn read_control_message<R: Read, T: DeserializeOwned>(
    reader: &mut R,
) -> Result<T, ControlError> {
    let mut prefix = [0u8; CONTROL_HEADER_SIZE];
    reader.read_exact(&mut prefix).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => ControlError::PeerClosed,
        _ => ControlError::Io(err),
    })?;

    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_CONTROL_MESSAGE_SIZE {
        return Err(ControlError::TooLarge {
            len,
            max: MAX_CONTROL_MESSAGE_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    serde_json::from_slice(&body).map_err(|err| ControlError::Malformed {
        reason: err.to_string(),
    })
}
