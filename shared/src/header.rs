use crate::{
    backends::{mono_time_in_nanos, Timestamp},
    connection::error::FramingError,
    messages::{error::PayloadError, payload_type::PayloadType},
};

/// Size in bytes of every encoded [`MessageHeader`].
pub const HEADER_SIZE: usize = 32;

/// Fixed-size record preceding every payload on an ingestion socket.
///
/// Layout (little-endian): `timestamp: u64`, `pid: i32`, `tid: i32`,
/// `payload_type: u32`, `payload_len: u32`, `sys_time: u64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageHeader {
    /// Monotonic nanoseconds at send time, 0 if the sender had no clock
    pub timestamp: u64,
    pub pid: i32,
    /// Best effort; equal to `pid` when the sender cannot tell
    pub tid: i32,
    /// Raw tag, see [`PayloadType`]
    pub payload_type: u32,
    pub payload_len: u32,
    /// Wall-clock seconds at send time
    pub sys_time: u64,
}

impl MessageHeader {
    /// Header stamped with the current clocks
    pub fn now(payload_type: PayloadType, pid: i32, tid: i32, payload_len: u32) -> Self {
        Self {
            timestamp: mono_time_in_nanos(),
            pid,
            tid,
            payload_type: payload_type.to_u32(),
            payload_len,
            sys_time: Timestamp::now_or_zero(),
        }
    }

    pub fn kind(&self) -> Result<PayloadType, PayloadError> {
        PayloadType::try_from(self.payload_type)
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len as usize
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        out[8..12].copy_from_slice(&self.pid.to_le_bytes());
        out[12..16].copy_from_slice(&self.tid.to_le_bytes());
        out[16..20].copy_from_slice(&self.payload_type.to_le_bytes());
        out[20..24].copy_from_slice(&self.payload_len.to_le_bytes());
        out[24..32].copy_from_slice(&self.sys_time.to_le_bytes());
        out
    }

    /// Parses exactly [`HEADER_SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FramingError> {
        let array: &[u8; HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| FramingError::TruncatedHeader { len: bytes.len() })?;
        Ok(Self::from_array(array))
    }

    pub fn from_array(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            timestamp: u64::from_le_bytes(field(bytes, 0)),
            pid: i32::from_le_bytes(field(bytes, 8)),
            tid: i32::from_le_bytes(field(bytes, 12)),
            payload_type: u32::from_le_bytes(field(bytes, 16)),
            payload_len: u32::from_le_bytes(field(bytes, 20)),
            sys_time: u64::from_le_bytes(field(bytes, 24)),
        }
    }
}

fn field<const N: usize>(bytes: &[u8; HEADER_SIZE], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}
