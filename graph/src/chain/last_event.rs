use std::collections::HashMap;

use crate::{
    error::StoreError,
    store::{GraphStore, NodeId, RelType},
};

/// Latest chained event per anchor, i.e. the target of its `IoEvents`
#[derive(Default)]
pub struct LastEventCache {
    entries: HashMap<NodeId, NodeId>,
}

impl LastEventCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, falling back to the store on a miss
    pub fn get(&mut self, store: &dyn GraphStore, anchor: NodeId) -> Result<Option<NodeId>, StoreError> {
        if let Some(event) = self.entries.get(&anchor) {
            return Ok(Some(*event));
        }
        let latest = store
            .outgoing(anchor, RelType::IoEvents)?
            .into_iter()
            .map(|rel| rel.end)
            .next();
        if let Some(event) = latest {
            self.entries.insert(anchor, event);
        }
        Ok(latest)
    }

    pub fn is_cached(&self, anchor: NodeId) -> bool {
        self.entries.contains_key(&anchor)
    }

    pub fn invalidate(&mut self, anchor: NodeId) {
        self.entries.remove(&anchor);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
