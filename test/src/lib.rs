//! Harness for the opus end-to-end tests: a collector on temporary UNIX
//! sockets plus builders for the records instrumented processes send.

pub mod helpers;

pub use helpers::{
    collector::Collector,
    records::{call, is_disconnect, startup},
};
