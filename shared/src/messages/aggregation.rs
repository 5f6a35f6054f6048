use serde::{Deserialize, Serialize};

use super::{
    error::PayloadError, func_info::FuncInfoMessage, payload::Payload, payload_type::PayloadType,
};

const LEN_PREFIX_SIZE: usize = 4;

/// Batch of call records flushed together by the interposition library.
///
/// Wire layout is a plain concatenation of `u32` little-endian length
/// prefixed [`FuncInfoMessage`] JSON records, in the order they were buffered.
/// Records for one descriptor are not guaranteed to be sorted by time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationMessage {
    pub messages: Vec<FuncInfoMessage>,
}

impl AggregationMessage {
    pub fn new(messages: Vec<FuncInfoMessage>) -> Self {
        Self { messages }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Payload for AggregationMessage {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Aggregation;

    fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let mut out = Vec::new();
        for message in &self.messages {
            let record = message.encode()?;
            let len = u32::try_from(record.len()).map_err(|_| PayloadError::Encode {
                kind: Self::PAYLOAD_TYPE.name(),
                reason: format!("record of {} bytes does not fit a u32 prefix", record.len()),
            })?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&record);
        }
        Ok(out)
    }

    fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let mut messages = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let rest = &bytes[offset..];
            if rest.len() < LEN_PREFIX_SIZE {
                return Err(PayloadError::TruncatedAggregate {
                    offset,
                    needed: LEN_PREFIX_SIZE,
                    available: rest.len(),
                });
            }

            let mut prefix = [0u8; LEN_PREFIX_SIZE];
            prefix.copy_from_slice(&rest[..LEN_PREFIX_SIZE]);
            let len = u32::from_le_bytes(prefix) as usize;

            let body = &rest[LEN_PREFIX_SIZE..];
            if body.len() < len {
                return Err(PayloadError::TruncatedAggregate {
                    offset: offset + LEN_PREFIX_SIZE,
                    needed: len,
                    available: body.len(),
                });
            }

            messages.push(FuncInfoMessage::decode(&body[..len])?);
            offset += LEN_PREFIX_SIZE + len;
        }

        Ok(Self { messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(func_name: &str, begin_time: u64) -> FuncInfoMessage {
        FuncInfoMessage {
            func_name: func_name.to_string(),
            args: Vec::new(),
            ret_val: 0,
            error_num: 0,
            begin_time,
            end_time: begin_time + 1,
            git_hash: None,
        }
    }

    #[test]
    fn records_keep_buffered_order() {
        let aggregate = AggregationMessage::new(vec![record("write", 30), record("read", 10)]);
        let bytes = aggregate.encode().expect("encode");
        let decoded = AggregationMessage::decode(&bytes).expect("decode");

        let times: Vec<u64> = decoded.messages.iter().map(|m| m.begin_time).collect();
        assert_eq!(times, vec![30, 10]);
    }

    #[test]
    fn empty_payload_is_an_empty_aggregate() {
        assert!(AggregationMessage::decode(&[]).expect("decode").is_empty());
    }

    #[test]
    fn truncated_record_is_rejected() {
        let bytes = AggregationMessage::new(vec![record("write", 1)])
            .encode()
            .expect("encode");
        let cut = &bytes[..bytes.len() - 2];

        match AggregationMessage::decode(cut) {
            Err(PayloadError::TruncatedAggregate { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_prefix_is_rejected() {
        assert_eq!(
            AggregationMessage::decode(&[1, 0]),
            Err(PayloadError::TruncatedAggregate {
                offset: 0,
                needed: 4,
                available: 2
            })
        );
    }
}
