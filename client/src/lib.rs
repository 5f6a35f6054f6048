//! # Opus Client
//! Connects to an opus collector to stream framed provenance messages, and
//! talks to its command-and-control channel.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod control_client;
mod error;
mod frame_sender;
mod server_addr;
mod stream;

pub use control_client::ControlClient;
pub use error::OpusClientError;
pub use frame_sender::FrameSender;
pub use server_addr::ServerAddr;
