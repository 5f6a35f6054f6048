use std::collections::{BTreeMap, HashSet};

use log::{trace, warn};
use serde_json::{Map, Value};

use crate::error::StoreError;

use super::{
    ChainRow, GraphStore, Mutation, Node, NodeId, NodeKind, Query, RelId, RelType, Relationship,
    MONO_TIME,
};

/// In-process graph store.
///
/// Default backend for the analyser and the store every test runs against.
/// `fail_next_commit` makes the next commit fail without applying anything.
#[derive(Default)]
pub struct MemoryGraphStore {
    nodes: BTreeMap<NodeId, Node>,
    relationships: BTreeMap<RelId, Relationship>,
    next_node: u64,
    next_rel: u64,
    mono_time: u64,
    failing_commits: usize,
    commits: usize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_commit(&mut self) {
        self.failing_commits += 1;
    }

    /// Successful commits so far
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn node_count(&self, kind: NodeKind) -> usize {
        self.nodes.values().filter(|node| node.kind == kind).count()
    }

    pub fn relationships(&self, rel_type: RelType) -> Vec<Relationship> {
        self.relationships
            .values()
            .filter(|rel| rel.rel_type == rel_type)
            .copied()
            .collect()
    }

    pub fn relationship_count(&self, rel_type: RelType) -> usize {
        self.relationships
            .values()
            .filter(|rel| rel.rel_type == rel_type)
            .count()
    }

    fn require_node(&self, id: NodeId) -> Result<&Node, StoreError> {
        self.nodes.get(&id).ok_or(StoreError::NodeNotFound { id })
    }

    fn validate(&self, mutations: &[Mutation]) -> Result<(), StoreError> {
        let mut deleted = HashSet::new();
        for mutation in mutations {
            match mutation {
                Mutation::CreateRelationship { start, end, .. } => {
                    self.require_node(*start)?;
                    self.require_node(*end)?;
                }
                Mutation::DeleteRelationship(id) => {
                    if !self.relationships.contains_key(id) || !deleted.insert(*id) {
                        return Err(StoreError::RelationshipNotFound { id: *id });
                    }
                }
                Mutation::SetProperty { node, .. } => {
                    self.require_node(*node)?;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, mutation: &Mutation, created: &mut Vec<RelId>) {
        match mutation {
            Mutation::CreateRelationship {
                start,
                end,
                rel_type,
            } => {
                let id = RelId(self.next_rel);
                self.next_rel += 1;
                self.relationships.insert(
                    id,
                    Relationship {
                        id,
                        rel_type: *rel_type,
                        start: *start,
                        end: *end,
                        mono_time: self.mono_time,
                    },
                );
                trace!("created {} {} -> {}", rel_type, start, end);
                created.push(id);
            }
            Mutation::DeleteRelationship(id) => {
                self.relationships.remove(id);
            }
            Mutation::SetProperty { node, key, value } => {
                if let Some(node) = self.nodes.get_mut(node) {
                    node.props.insert(key.clone(), value.clone());
                }
            }
        }
    }

    fn single_target(&self, node: NodeId, rel_type: RelType) -> Option<NodeId> {
        self.relationships
            .values()
            .filter(|rel| rel.start == node && rel.rel_type == rel_type)
            .map(|rel| rel.end)
            .next()
    }

    fn event_path(&self, local: NodeId) -> Result<Vec<Node>, StoreError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut next = self.single_target(local, RelType::IoEvents);

        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(StoreError::Rejected {
                    reason: format!("PREV_EVENT cycle through {}", id),
                });
            }
            path.push(self.require_node(id)?.clone());
            next = self.single_target(id, RelType::PrevEvent);
        }
        Ok(path)
    }
}

impl GraphStore for MemoryGraphStore {
    fn set_mono_time_for_msg(&mut self, mono_time: u64) {
        self.mono_time = mono_time;
    }

    fn create_node(&mut self, kind: NodeKind, mut props: Map<String, Value>) -> Result<Node, StoreError> {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        props
            .entry(MONO_TIME)
            .or_insert_with(|| Value::from(self.mono_time));

        let node = Node { id, kind, props };
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<(), StoreError> {
        self.require_node(id)?;
        if self
            .relationships
            .values()
            .any(|rel| rel.start == id || rel.end == id)
        {
            return Err(StoreError::Rejected {
                reason: format!("{} still has relationships", id),
            });
        }
        self.nodes.remove(&id);
        trace!("deleted {}", id);
        Ok(())
    }

    fn node(&self, id: NodeId) -> Result<Node, StoreError> {
        self.require_node(id).cloned()
    }

    fn outgoing(&self, node: NodeId, rel_type: RelType) -> Result<Vec<Relationship>, StoreError> {
        self.require_node(node)?;
        Ok(self
            .relationships
            .values()
            .filter(|rel| rel.start == node && rel.rel_type == rel_type)
            .copied()
            .collect())
    }

    fn incoming(&self, node: NodeId, rel_type: RelType) -> Result<Vec<Relationship>, StoreError> {
        self.require_node(node)?;
        Ok(self
            .relationships
            .values()
            .filter(|rel| rel.end == node && rel.rel_type == rel_type)
            .copied()
            .collect())
    }

    fn commit(&mut self, mutations: &[Mutation]) -> Result<Vec<RelId>, StoreError> {
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            warn!("rejecting commit of {} mutations", mutations.len());
            return Err(StoreError::Rejected {
                reason: "injected commit failure".to_string(),
            });
        }
        self.validate(mutations)?;

        let mut created = Vec::new();
        for mutation in mutations {
            self.apply(mutation, &mut created);
        }
        self.commits += 1;
        Ok(created)
    }

    fn query(&self, query: &Query) -> Result<Vec<ChainRow>, StoreError> {
        match query {
            Query::EventChains {
                process,
                local_name,
            } => {
                let mut rows = Vec::new();
                for rel in self.incoming(*process, RelType::ProcObj)? {
                    let local = self.require_node(rel.start)?;
                    if local.name() != Some(local_name.as_str()) {
                        continue;
                    }
                    rows.push(ChainRow {
                        local: local.clone(),
                        path: self.event_path(local.id)?,
                    });
                }
                rows.sort_by_key(|row| (row.local.mono_time().unwrap_or(0), row.local.id));
                Ok(rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn nodes_take_the_message_clock() {
        let mut store = MemoryGraphStore::new();
        store.set_mono_time_for_msg(42);
        let stamped = store.create_node(NodeKind::Event, Map::new()).expect("node");
        let explicit = store
            .create_node(NodeKind::Local, props(json!({"mono_time": 7})))
            .expect("node");

        assert_eq!(stamped.mono_time(), Some(42));
        assert_eq!(explicit.mono_time(), Some(7));
    }

    #[test]
    fn invalid_batch_applies_nothing() {
        let mut store = MemoryGraphStore::new();
        let a = store.create_node(NodeKind::Event, Map::new()).expect("a").id;
        let b = store.create_node(NodeKind::Event, Map::new()).expect("b").id;

        let result = store.commit(&[
            Mutation::link(a, b, RelType::PrevEvent),
            Mutation::DeleteRelationship(RelId(99)),
        ]);

        assert_eq!(result, Err(StoreError::RelationshipNotFound { id: RelId(99) }));
        assert_eq!(store.relationship_count(RelType::PrevEvent), 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn only_unlinked_nodes_can_be_deleted() {
        let mut store = MemoryGraphStore::new();
        let a = store.create_node(NodeKind::Event, Map::new()).expect("a").id;
        let b = store.create_node(NodeKind::Event, Map::new()).expect("b").id;
        let c = store.create_node(NodeKind::Event, Map::new()).expect("c").id;
        store
            .commit(&[Mutation::link(a, b, RelType::PrevEvent)])
            .expect("link");

        assert!(matches!(store.delete_node(b), Err(StoreError::Rejected { .. })));
        assert_eq!(store.delete_node(c), Ok(()));
        assert_eq!(store.delete_node(c), Err(StoreError::NodeNotFound { id: c }));
        assert_eq!(store.node_count(NodeKind::Event), 2);
    }

    #[test]
    fn double_delete_in_one_batch_is_rejected() {
        let mut store = MemoryGraphStore::new();
        let a = store.create_node(NodeKind::Event, Map::new()).expect("a").id;
        let b = store.create_node(NodeKind::Event, Map::new()).expect("b").id;
        let ids = store
            .commit(&[Mutation::link(a, b, RelType::PrevEvent)])
            .expect("link");

        let result = store.commit(&[
            Mutation::DeleteRelationship(ids[0]),
            Mutation::DeleteRelationship(ids[0]),
        ]);
        assert!(result.is_err());
        assert_eq!(store.relationship_count(RelType::PrevEvent), 1);
    }

    #[test]
    fn injected_failure_is_one_shot() {
        let mut store = MemoryGraphStore::new();
        let a = store.create_node(NodeKind::Meta, Map::new()).expect("a").id;
        store.fail_next_commit();

        assert!(store.commit(&[Mutation::set(a, "k", 1)]).is_err());
        assert!(store.commit(&[Mutation::set(a, "k", 1)]).is_ok());
        assert_eq!(store.node(a).expect("a").prop_u64("k"), Some(1));
    }

    #[test]
    fn event_chains_walk_latest_to_earliest() {
        let mut store = MemoryGraphStore::new();
        let process = store.create_node(NodeKind::Process, Map::new()).expect("p").id;
        let late = store
            .create_node(NodeKind::Local, props(json!({"name": "3", "mono_time": 50})))
            .expect("late")
            .id;
        let early = store
            .create_node(NodeKind::Local, props(json!({"name": "3", "mono_time": 10})))
            .expect("early")
            .id;
        let other = store
            .create_node(NodeKind::Local, props(json!({"name": "4", "mono_time": 1})))
            .expect("other")
            .id;
        let first = store.create_node(NodeKind::Event, Map::new()).expect("e1").id;
        let second = store.create_node(NodeKind::Event, Map::new()).expect("e2").id;

        store
            .commit(&[
                Mutation::link(late, process, RelType::ProcObj),
                Mutation::link(early, process, RelType::ProcObj),
                Mutation::link(other, process, RelType::ProcObj),
                Mutation::link(early, second, RelType::IoEvents),
                Mutation::link(second, first, RelType::PrevEvent),
            ])
            .expect("commit");

        let rows = store
            .query(&Query::EventChains {
                process,
                local_name: "3".to_string(),
            })
            .expect("query");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].local.id, early);
        let path: Vec<NodeId> = rows[0].path.iter().map(|node| node.id).collect();
        assert_eq!(path, vec![second, first]);
        assert_eq!(rows[1].local.id, late);
        assert!(rows[1].path.is_empty());
    }
}
