use crate::header::{MessageHeader, HEADER_SIZE};

use super::{error::PayloadError, payload::Payload, payload_type::PayloadType};

/// One complete `(header, payload)` pair as it came off the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    header: MessageHeader,
    payload: Box<[u8]>,
}

impl RawMessage {
    pub fn new(header: MessageHeader, payload: Vec<u8>) -> Self {
        Self {
            header,
            payload: payload.into_boxed_slice(),
        }
    }

    pub(crate) fn from_parts(header_bytes: [u8; HEADER_SIZE], payload: Vec<u8>) -> Self {
        Self::new(MessageHeader::from_array(&header_bytes), payload)
    }

    /// Encodes `payload` and stamps a header with the current clocks
    pub fn from_payload<P: Payload>(pid: i32, tid: i32, payload: &P) -> Result<Self, PayloadError> {
        let bytes = payload.encode()?;
        let header = MessageHeader::now(P::PAYLOAD_TYPE, pid, tid, bytes.len() as u32);
        Ok(Self::new(header, bytes))
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        self.header.to_bytes()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn pid(&self) -> i32 {
        self.header.pid
    }

    pub fn kind(&self) -> Result<PayloadType, PayloadError> {
        self.header.kind()
    }

    /// Decodes the body as `P`, checking the header tag first
    pub fn decode<P: Payload>(&self) -> Result<P, PayloadError> {
        if self.header.payload_type != P::PAYLOAD_TYPE.to_u32() {
            return Err(PayloadError::WrongPayloadType {
                expected: P::PAYLOAD_TYPE.name(),
                found: self.header.payload_type,
            });
        }
        P::decode(&self.payload)
    }

    pub fn into_parts(self) -> (MessageHeader, Box<[u8]>) {
        (self.header, self.payload)
    }
}
