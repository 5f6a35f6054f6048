use std::{io::Write, process};

use log::trace;

use opus_shared::{Encoder, MessageHeader, Payload, PayloadType};

use crate::{error::OpusClientError, server_addr::ServerAddr, stream::Stream};

/// Streams framed messages to the collector over one connection.
pub struct FrameSender {
    stream: Stream,
    encoder: Encoder,
    pid: i32,
    tid: i32,
}

impl FrameSender {
    /// Connects as the current process
    pub fn connect(addr: &ServerAddr) -> Result<Self, OpusClientError> {
        let pid = process::id() as i32;
        Ok(Self {
            stream: Stream::connect(addr)?,
            encoder: Encoder::new(),
            pid,
            tid: pid,
        })
    }

    /// Overrides the pid/tid stamped into headers. The collector keys
    /// connections by the OS-reported peer pid regardless.
    pub fn with_identity(mut self, pid: i32, tid: i32) -> Self {
        self.pid = pid;
        self.tid = tid;
        self
    }

    pub fn send<P: Payload>(&mut self, payload: &P) -> Result<(), OpusClientError> {
        let body = payload.encode()?;
        self.send_bytes(P::PAYLOAD_TYPE, &body)
    }

    /// Frames an already encoded body
    pub fn send_bytes(&mut self, payload_type: PayloadType, body: &[u8]) -> Result<(), OpusClientError> {
        let len = u32::try_from(body.len())
            .map_err(|_| OpusClientError::PayloadTooLarge { len: body.len() })?;
        let header = MessageHeader::now(payload_type, self.pid, self.tid, len);
        self.send_frame(&header, body)
    }

    /// Writes `header` exactly as given, followed by `body`
    pub fn send_frame(&mut self, header: &MessageHeader, body: &[u8]) -> Result<(), OpusClientError> {
        let frame = self.encoder.encode(header, body);
        trace!("sending {} byte frame ({})", frame.len(), payload_name(header));
        self.stream.write_all(frame)?;
        Ok(())
    }

    /// Writes raw bytes with no framing. Lets callers split a frame across
    /// several writes.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), OpusClientError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }
}

fn payload_name(header: &MessageHeader) -> &'static str {
    header.kind().map(PayloadType::name).unwrap_or("unknown")
}
