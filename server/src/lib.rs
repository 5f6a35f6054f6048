//! # Opus Server
//! Provenance collector. Accepts connections from instrumented processes,
//! reassembles their framed messages on a single polling thread, and hands
//! each iteration's messages downstream as a batch. Administrative commands
//! reach the polling thread through a single-slot command bridge.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod transport;
pub mod shared {
    pub use opus_shared::{
        ControlRequest, ControlResponse, GenericMessage, MessageHeader, Payload, PayloadType,
        RawMessage,
    };
}

mod command;
mod connection;
mod error;
mod events;
mod multiplexer;
mod server;

pub use command::{Command, CommandBridge, ControlServer};
pub use connection::{
    connection_entry::ConnectionEntry,
    connection_reader::{ConnectionReader, ReadStatus},
    owner_index::OwnerIndex,
};
pub use error::{BridgeError, OpusServerError};
pub use events::IngestBatch;
pub use multiplexer::{DetachResult, Multiplexer};
pub use server::{IngestionWorker, ServerConfig, WorkerHandle};
