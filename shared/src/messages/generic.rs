use serde::{Deserialize, Serialize};

use super::{payload::Payload, payload_type::PayloadType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericType {
    Discon,
    Other,
}

/// Free-form notification; the collector emits one when an owner's last connection goes away.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub msg_type: GenericType,
    pub msg_desc: String,
}

impl GenericMessage {
    pub fn disconnect(fd: i32) -> Self {
        Self {
            msg_type: GenericType::Discon,
            msg_desc: format!("Client socket: {} disconnected", fd),
        }
    }

    pub fn is_disconnect(&self) -> bool {
        self.msg_type == GenericType::Discon
    }
}

impl Payload for GenericMessage {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Generic;
}
