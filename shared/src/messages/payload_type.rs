use std::fmt;

use super::error::PayloadError;

/// Tag carried in [`crate::MessageHeader::payload_type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadType {
    Startup,
    LibInfo,
    FuncInfo,
    Generic,
    Aggregation,
    Term,
}

impl PayloadType {
    pub fn to_u32(self) -> u32 {
        match self {
            PayloadType::Startup => 1,
            PayloadType::LibInfo => 2,
            PayloadType::FuncInfo => 3,
            PayloadType::Generic => 4,
            PayloadType::Aggregation => 5,
            PayloadType::Term => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PayloadType::Startup => "startup",
            PayloadType::LibInfo => "lib_info",
            PayloadType::FuncInfo => "func_info",
            PayloadType::Generic => "generic",
            PayloadType::Aggregation => "aggregation",
            PayloadType::Term => "term",
        }
    }
}

impl TryFrom<u32> for PayloadType {
    type Error = PayloadError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(PayloadType::Startup),
            2 => Ok(PayloadType::LibInfo),
            3 => Ok(PayloadType::FuncInfo),
            4 => Ok(PayloadType::Generic),
            5 => Ok(PayloadType::Aggregation),
            6 => Ok(PayloadType::Term),
            _ => Err(PayloadError::UnknownPayloadType { tag }),
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
