use serde::{Deserialize, Serialize};

use super::{payload::Payload, payload_type::PayloadType};

/// Sent once by a freshly instrumented process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupMessage {
    pub exec_name: String,
    pub cwd: String,
    #[serde(default)]
    pub cmd_line_args: Vec<String>,
    pub start_time: u64,
    pub ppid: i32,
}

impl Payload for StartupMessage {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Startup;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMessage {
    pub exit_status: i32,
}

impl Payload for TermMessage {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Term;
}
