use thiserror::Error;

/// Errors raised while splitting an ingestion byte stream into messages
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Header declared a payload larger than the configured ceiling (SECURITY: potentially hostile peer)
    #[error("Declared payload of {declared} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        declared: usize,
        max: usize,
    },

    /// Fewer than a full header's worth of bytes were handed to the header parser
    #[error("Header requires 32 bytes, got {len}")]
    TruncatedHeader {
        len: usize,
    },

    /// `advance` was called with more bytes than the last `spare_mut` exposed
    #[error("Advanced by {advanced} bytes but only {available} were requested")]
    Overrun {
        advanced: usize,
        available: usize,
    },
}
