use std::time::Duration;

use log::debug;
use serde_json::Value;

use opus_shared::{read_control_message, write_control_message, ControlRequest, ControlResponse};

use crate::{error::OpusClientError, server_addr::ServerAddr, stream::Stream};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends command-and-control requests, one connection per request.
pub struct ControlClient {
    addr: ServerAddr,
    recv_timeout: Duration,
}

impl ControlClient {
    pub fn new(addr: ServerAddr) -> Self {
        Self {
            addr,
            recv_timeout: RECV_TIMEOUT,
        }
    }

    pub fn with_recv_timeout(mut self, recv_timeout: Duration) -> Self {
        self.recv_timeout = recv_timeout;
        self
    }

    /// Sends an arbitrary JSON request and returns the raw JSON answer
    pub fn request(&self, request: &Value) -> Result<Value, OpusClientError> {
        self.exchange(request)
    }

    pub fn send(&self, request: &ControlRequest) -> Result<ControlResponse, OpusClientError> {
        self.exchange(request)
    }

    pub fn ps(&self) -> Result<ControlResponse, OpusClientError> {
        self.send(&ControlRequest::ps())
    }

    pub fn detach(&self, pid: i32) -> Result<ControlResponse, OpusClientError> {
        self.send(&ControlRequest::detach(pid))
    }

    pub fn status(&self) -> Result<ControlResponse, OpusClientError> {
        self.send(&ControlRequest::status())
    }

    fn exchange<Req, Resp>(&self, request: &Req) -> Result<Resp, OpusClientError>
    where
        Req: serde::Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let mut stream = Stream::connect(&self.addr)?;
        stream.set_read_timeout(Some(self.recv_timeout))?;
        write_control_message(&mut stream, request)?;
        let response = read_control_message(&mut stream)?;
        debug!("control request to {} answered", self.addr);
        Ok(response)
    }
}
