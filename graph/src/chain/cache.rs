use std::collections::{hash_map::Entry, HashMap};

use log::{debug, warn};

use crate::{
    error::{ChainError, StoreError},
    store::{GraphStore, Mutation, NodeId, RelType},
};

use super::{last_event::LastEventCache, loader::load_chains, ChainIndex, ChainLink, Placement, SpliceOutcome};

type ChainKey = (NodeId, String);

/// Per-(process, descriptor) chain indexes mirrored from the store.
///
/// The store stays authoritative. A missing entry is rebuilt with
/// [`load_chains`], and an entry is only changed after its store commit
/// succeeded.
#[derive(Default)]
pub struct ChainCache {
    indexes: HashMap<ChainKey, ChainIndex>,
    last_events: LastEventCache,
}

impl ChainCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, process: NodeId, descriptor: &str) -> Option<&ChainIndex> {
        self.indexes.get(&(process, descriptor.to_string()))
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Cached index, loading it from the store on a miss
    pub fn load(
        &mut self,
        store: &mut dyn GraphStore,
        process: NodeId,
        descriptor: &str,
        mono_time: u64,
    ) -> Result<&ChainIndex, ChainError> {
        match self.indexes.entry((process, descriptor.to_string())) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let index = load_chains(store, process, descriptor, mono_time)?;
                Ok(entry.insert(index))
            }
        }
    }

    /// Anchor of the chain an event at `before_time` belongs to, loading the
    /// index on a miss. `None` when the event predates every anchor.
    pub fn anchor_for(
        &mut self,
        store: &mut dyn GraphStore,
        process: NodeId,
        descriptor: &str,
        before_time: u64,
    ) -> Result<Option<NodeId>, ChainError> {
        let index = self.load(store, process, descriptor, before_time)?;
        Ok(index
            .select(before_time)
            .and_then(|position| index.get(position))
            .map(|chain| chain.anchor()))
    }

    /// Places `event` in its chain for `(process, descriptor)` and links it
    /// into the store.
    pub fn splice(
        &mut self,
        store: &mut dyn GraphStore,
        process: NodeId,
        descriptor: &str,
        event: ChainLink,
    ) -> Result<SpliceOutcome, ChainError> {
        self.load(store, process, descriptor, event.before_time)?;
        let Some(index) = self.indexes.get_mut(&(process, descriptor.to_string())) else {
            return Ok(SpliceOutcome::Misplaced);
        };

        let Some(chain) = index.select_mut(event.before_time) else {
            warn!(
                "Misplaced message: event {} at {} predates every anchor of {} for {}",
                event.node, event.before_time, descriptor, process
            );
            return Ok(SpliceOutcome::Misplaced);
        };

        let anchor = chain.anchor();
        let position = chain.position(event.before_time);
        let mut mutations = Vec::new();

        let placement = if chain.is_empty() {
            mutations.push(Mutation::link(anchor, event.node, RelType::IoEvents));
            Placement::First
        } else if position == 0 {
            let head = chain.events()[0].node;
            mutations.push(Mutation::link(head, event.node, RelType::PrevEvent));
            Placement::Head
        } else if position == chain.len() {
            let tail = chain.events()[position - 1].node;
            unlink(store, anchor, RelType::IoEvents, &mut mutations)?;
            mutations.push(Mutation::link(event.node, tail, RelType::PrevEvent));
            mutations.push(Mutation::link(anchor, event.node, RelType::IoEvents));
            Placement::Tail
        } else {
            let later = chain.events()[position].node;
            let earlier = chain.events()[position - 1].node;
            unlink(store, later, RelType::PrevEvent, &mut mutations)?;
            mutations.push(Mutation::link(later, event.node, RelType::PrevEvent));
            mutations.push(Mutation::link(event.node, earlier, RelType::PrevEvent));
            Placement::Middle
        };

        let removed = mutations
            .iter()
            .filter(|mutation| matches!(mutation, Mutation::DeleteRelationship(_)))
            .count();
        let created = mutations.len() - removed;

        store.commit(&mutations)?;
        chain.insert(position, event);
        if matches!(placement, Placement::First | Placement::Tail) {
            self.last_events.invalidate(anchor);
        }

        debug!(
            "spliced {} into chain of {} at {} ({:?})",
            event.node, anchor, position, placement
        );
        Ok(SpliceOutcome::Spliced {
            anchor,
            placement,
            position,
            removed,
            created,
        })
    }

    pub fn invalidate(&mut self, process: NodeId, descriptor: &str) {
        if let Some(index) = self.indexes.remove(&(process, descriptor.to_string())) {
            for chain in index.chains() {
                self.last_events.invalidate(chain.anchor());
            }
        }
    }

    /// Drops every chain of `process`, e.g. when its session ends
    pub fn invalidate_process(&mut self, process: NodeId) {
        let last_events = &mut self.last_events;
        self.indexes.retain(|(owner, _), index| {
            if *owner != process {
                return true;
            }
            for chain in index.chains() {
                last_events.invalidate(chain.anchor());
            }
            false
        });
    }

    pub fn last_event(&mut self, store: &dyn GraphStore, anchor: NodeId) -> Result<Option<NodeId>, StoreError> {
        self.last_events.get(store, anchor)
    }

    pub fn last_events(&self) -> &LastEventCache {
        &self.last_events
    }
}

fn unlink(
    store: &dyn GraphStore,
    node: NodeId,
    rel_type: RelType,
    mutations: &mut Vec<Mutation>,
) -> Result<(), StoreError> {
    for rel in store.outgoing(node, rel_type)? {
        mutations.push(Mutation::DeleteRelationship(rel.id));
    }
    Ok(())
}
