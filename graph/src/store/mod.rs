use std::fmt;

use serde_json::{Map, Value};

use crate::error::StoreError;

pub mod memory;

pub const MONO_TIME: &str = "mono_time";
pub const NAME: &str = "name";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelId(pub u64);

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rel#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Process,
    /// A process-local handle on a resource; anchors a chain
    Local,
    Global,
    Event,
    Meta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelType {
    /// local -> owning process
    ProcObj,
    /// global -> local
    LocObj,
    /// anchor -> latest event of its chain
    IoEvents,
    /// event -> the event just before it
    PrevEvent,
    /// process -> meta record
    ProcMeta,
}

impl RelType {
    pub fn name(&self) -> &'static str {
        match self {
            RelType::ProcObj => "PROC_OBJ",
            RelType::LocObj => "LOC_OBJ",
            RelType::IoEvents => "IO_EVENTS",
            RelType::PrevEvent => "PREV_EVENT",
            RelType::ProcMeta => "PROC_META",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub props: Map<String, Value>,
}

impl Node {
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn prop_u64(&self, key: &str) -> Option<u64> {
        self.props.get(key).and_then(Value::as_u64)
    }

    pub fn mono_time(&self) -> Option<u64> {
        self.prop_u64(MONO_TIME)
    }

    pub fn name(&self) -> Option<&str> {
        self.props.get(NAME).and_then(Value::as_str)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: RelId,
    pub rel_type: RelType,
    pub start: NodeId,
    pub end: NodeId,
    pub mono_time: u64,
}

/// One write in a [`GraphStore::commit`] batch
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    CreateRelationship {
        start: NodeId,
        end: NodeId,
        rel_type: RelType,
    },
    DeleteRelationship(RelId),
    SetProperty {
        node: NodeId,
        key: String,
        value: Value,
    },
}

impl Mutation {
    pub fn link(start: NodeId, end: NodeId, rel_type: RelType) -> Self {
        Mutation::CreateRelationship {
            start,
            end,
            rel_type,
        }
    }

    pub fn set(node: NodeId, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Mutation::SetProperty {
            node,
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Query {
    /// Every local of `process` named `local_name`, each with the event
    /// path reachable from it
    EventChains { process: NodeId, local_name: String },
}

/// Result row of [`Query::EventChains`]
#[derive(Clone, Debug, PartialEq)]
pub struct ChainRow {
    pub local: Node,
    /// Latest event first, following `PrevEvent` down to the earliest
    pub path: Vec<Node>,
}

/// Persistent home of the provenance graph.
///
/// Each call is its own transaction. `commit` applies the whole batch or
/// none of it.
pub trait GraphStore {
    /// Logical clock stamped onto every node and relationship created after
    /// this call
    fn set_mono_time_for_msg(&mut self, mono_time: u64);

    fn create_node(&mut self, kind: NodeKind, props: Map<String, Value>) -> Result<Node, StoreError>;

    /// Removes a node no relationship touches
    fn delete_node(&mut self, id: NodeId) -> Result<(), StoreError>;

    fn node(&self, id: NodeId) -> Result<Node, StoreError>;

    fn outgoing(&self, node: NodeId, rel_type: RelType) -> Result<Vec<Relationship>, StoreError>;

    fn incoming(&self, node: NodeId, rel_type: RelType) -> Result<Vec<Relationship>, StoreError>;

    /// Returns the ids of created relationships in batch order
    fn commit(&mut self, mutations: &[Mutation]) -> Result<Vec<RelId>, StoreError>;

    /// Rows come back ordered by the local's `mono_time`
    fn query(&self, query: &Query) -> Result<Vec<ChainRow>, StoreError>;
}
