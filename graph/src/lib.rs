//! # Opus Graph
//! Turns collector batches into a provenance graph. Keeps every descriptor's
//! I/O events in a causally ordered chain, in memory and in the store.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

mod analyser;
mod chain;
mod error;
mod functions;
mod handlers;
mod store;

pub use analyser::{Analyser, AnalyserStats};
pub use chain::{
    cache::ChainCache,
    last_event::LastEventCache,
    loader::load_chains,
    Chain, ChainIndex, ChainLink, Placement, SpliceOutcome,
};
pub use error::{AnalyserError, ChainError, FunctionTableError, StoreError};
pub use functions::{Action, ArgBinding, BoundArgs, FunctionSpec, FunctionTable, POSIX_TABLE};
pub use handlers::{ActionContext, ActionOutcome, Handler, HandlerRegistry};
pub use store::{
    memory::MemoryGraphStore, ChainRow, GraphStore, Mutation, Node, NodeId, NodeKind, Query,
    RelId, RelType, Relationship,
};
