use thiserror::Error;

/// Errors raised when a payload cannot be interpreted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Header carried a tag outside the known payload types
    #[error("Unknown payload type tag {tag}")]
    UnknownPayloadType {
        tag: u32,
    },

    /// Decoder was asked for one payload type but the header names another
    #[error("Expected a {expected} payload, header says {found}")]
    WrongPayloadType {
        expected: &'static str,
        found: u32,
    },

    /// Record body is not valid JSON for its type
    #[error("Malformed {kind} record: {reason}")]
    Malformed {
        kind: &'static str,
        reason: String,
    },

    /// Record could not be serialized
    #[error("Failed to encode {kind} record: {reason}")]
    Encode {
        kind: &'static str,
        reason: String,
    },

    /// Aggregate ended inside a length prefix or a record
    #[error("Aggregate truncated at offset {offset}: needed {needed} bytes, {available} left")]
    TruncatedAggregate {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A record named an argument or field that is not present
    #[error("Record for {func_name} has no value for {key}")]
    MissingValue {
        func_name: String,
        key: String,
    },
}
