mod bridge;
mod control_server;

pub use bridge::CommandBridge;
pub use control_server::ControlServer;

use opus_shared::ControlRequest;

/// Administrative operation executed on the ingestion worker's thread
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Ps,
    Detach { pid: Option<i32> },
    Status,
    Unknown(String),
}

impl From<ControlRequest> for Command {
    fn from(request: ControlRequest) -> Self {
        match request.cmd.as_str() {
            "ps" => Command::Ps,
            "detach" => Command::Detach { pid: request.pid },
            "status" => Command::Status,
            _ => Command::Unknown(request.cmd),
        }
    }
}
