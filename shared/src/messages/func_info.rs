use serde::{Deserialize, Serialize};

use super::{error::PayloadError, payload::Payload, payload_type::PayloadType};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One intercepted library call.
///
/// `begin_time` is the monotonic instant the call started and doubles as the
/// ordering key when the event is placed in its descriptor's chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfoMessage {
    pub func_name: String,
    #[serde(default)]
    pub args: Vec<KvPair>,
    pub ret_val: i64,
    #[serde(default)]
    pub error_num: i32,
    pub begin_time: u64,
    pub end_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_hash: Option<String>,
}

impl FuncInfoMessage {
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|pair| pair.key == key)
            .map(|pair| pair.value.as_str())
    }

    /// Named value from the record itself, as a string
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "func_name" => Some(self.func_name.clone()),
            "ret_val" => Some(self.ret_val.to_string()),
            "error_num" => Some(self.error_num.to_string()),
            "begin_time" => Some(self.begin_time.to_string()),
            "end_time" => Some(self.end_time.to_string()),
            "git_hash" => self.git_hash.clone(),
            _ => None,
        }
    }

    pub fn require_arg(&self, key: &str) -> Result<&str, PayloadError> {
        self.arg(key).ok_or_else(|| PayloadError::MissingValue {
            func_name: self.func_name.clone(),
            key: key.to_string(),
        })
    }
}

impl Payload for FuncInfoMessage {
    const PAYLOAD_TYPE: PayloadType = PayloadType::FuncInfo;
}
