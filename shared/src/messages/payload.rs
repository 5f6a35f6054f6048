use serde::{de::DeserializeOwned, Serialize};

use super::{error::PayloadError, payload_type::PayloadType};

/// A record that travels as the body of one framed message.
///
/// Most records are a single JSON object; the default methods cover them.
/// [`crate::AggregationMessage`] overrides both to use its own layout.
pub trait Payload: Sized + Serialize + DeserializeOwned {
    const PAYLOAD_TYPE: PayloadType;

    fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        serde_json::to_vec(self).map_err(|err| PayloadError::Encode {
            kind: Self::PAYLOAD_TYPE.name(),
            reason: err.to_string(),
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        serde_json::from_slice(bytes).map_err(|err| PayloadError::Malformed {
            kind: Self::PAYLOAD_TYPE.name(),
            reason: err.to_string(),
        })
    }
}
