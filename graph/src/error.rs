use thiserror::Error;

use opus_shared::PayloadError;

use crate::store::{NodeId, RelId};

/// Errors raised by a graph store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Node {id} does not exist")]
    NodeNotFound { id: NodeId },

    #[error("Relationship {id} does not exist")]
    RelationshipNotFound { id: RelId },

    /// Store refused the call; nothing from it was applied
    #[error("Store rejected the operation: {reason}")]
    Rejected { reason: String },
}

/// Errors raised while loading or splicing an event chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A node on a chain lacks a property the ordering depends on
    #[error("Node {node} has no usable {key} property")]
    MissingProperty { node: NodeId, key: &'static str },
}

/// Errors raised by the declarative function table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionTableError {
    #[error("Function table is not valid YAML: {reason}")]
    Parse { reason: String },

    #[error("Failed to read function table {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Function {func} maps to unknown action {action}")]
    UnknownAction { func: String, action: String },

    #[error("Function {func} has an invalid binding for {arg}: {reason}")]
    InvalidBinding {
        func: String,
        arg: String,
        reason: String,
    },

    #[error("Failed to find mapping for function {func}")]
    MissingMapping { func: String },

    /// Function is mapped but does not name the descriptor it works on
    #[error("Function {func} has no filedes binding")]
    NoDescriptor { func: String },

    #[error("Function {func} produced no value for {arg}")]
    MissingValue { func: String, arg: String },
}

/// Errors raised while analysing one message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyserError {
    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Functions(#[from] FunctionTableError),

    /// Registry has no handler for an action the table uses
    #[error("No handler registered for action {action}")]
    UnhandledAction { action: &'static str },
}
