//! # Opus Shared
//! Wire types shared between the opus collector, the clients that stream
//! provenance into it, and the analyser that consumes its batches.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod backends;
mod connection;
mod constants;
mod control;
mod header;
mod messages;

pub use backends::{mono_time_in_nanos, Timestamp, TimeError};
pub use connection::{
    decoder::{DecodeState, Decoder},
    encoder::Encoder,
    error::FramingError,
};
pub use constants::{MAX_CONTROL_MESSAGE_SIZE, MAX_PAYLOAD_SIZE};
pub use control::{
    read_control_message, write_control_message, ControlError, ControlRequest, ControlResponse,
    ProducerStatus, CONTROL_HEADER_SIZE,
};
pub use header::{MessageHeader, HEADER_SIZE};
pub use messages::{
    aggregation::AggregationMessage,
    error::PayloadError,
    func_info::{FuncInfoMessage, KvPair},
    generic::{GenericMessage, GenericType},
    payload::Payload,
    payload_type::PayloadType,
    raw_message::RawMessage,
    startup::{StartupMessage, TermMessage},
};
