use crate::store::NodeId;

pub mod cache;
pub mod last_event;
pub mod loader;

pub const BEFORE_TIME: &str = "before_time";

/// An event as its chain sees it: the node and its ordering key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub node: NodeId,
    pub before_time: u64,
}

impl ChainLink {
    pub fn new(node: NodeId, before_time: u64) -> Self {
        Self { node, before_time }
    }
}

/// Ordered I/O history of one local.
///
/// `events` runs earliest to latest. In the store the anchor's `IoEvents`
/// points at the last element and each element's `PrevEvent` points at the
/// one before it, so the first element has no outgoing `PrevEvent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chain {
    anchor: NodeId,
    anchor_time: u64,
    events: Vec<ChainLink>,
}

impl Chain {
    pub fn new(anchor: NodeId, anchor_time: u64) -> Self {
        Self {
            anchor,
            anchor_time,
            events: Vec::new(),
        }
    }

    pub(crate) fn with_events(anchor: NodeId, anchor_time: u64, events: Vec<ChainLink>) -> Self {
        Self {
            anchor,
            anchor_time,
            events,
        }
    }

    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    pub fn anchor_time(&self) -> u64 {
        self.anchor_time
    }

    pub fn events(&self) -> &[ChainLink] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn head(&self) -> Option<&ChainLink> {
        self.events.first()
    }

    pub fn tail(&self) -> Option<&ChainLink> {
        self.events.last()
    }

    /// Index a new event with `before_time` would take. Equal keys land after
    /// the existing ones. Scans from the back since events mostly arrive in
    /// order.
    pub fn position(&self, before_time: u64) -> usize {
        let mut index = self.events.len();
        while index > 0 {
            if self.events[index - 1].before_time <= before_time {
                return index;
            }
            index -= 1;
        }
        0
    }

    pub(crate) fn insert(&mut self, index: usize, link: ChainLink) {
        self.events.insert(index, link);
    }
}

/// All chains for one (process, descriptor), ordered by anchor time
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainIndex {
    chains: Vec<Chain>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chains(mut chains: Vec<Chain>) -> Self {
        chains.sort_by_key(|chain| chain.anchor_time);
        Self { chains }
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chain with the greatest anchor time not after `before_time`
    pub fn select(&self, before_time: u64) -> Option<usize> {
        let after = self
            .chains
            .partition_point(|chain| chain.anchor_time <= before_time);
        after.checked_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<&Chain> {
        self.chains.get(index)
    }

    pub(crate) fn select_mut(&mut self, before_time: u64) -> Option<&mut Chain> {
        let index = self.select(before_time)?;
        self.chains.get_mut(index)
    }
}

/// Where a spliced event went
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Chain was empty
    First,
    /// Before the earliest event
    Head,
    /// After the latest event
    Tail,
    Middle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpliceOutcome {
    Spliced {
        anchor: NodeId,
        placement: Placement,
        position: usize,
        removed: usize,
        created: usize,
    },
    /// Event predates every anchor for its descriptor and was dropped
    Misplaced,
}

impl SpliceOutcome {
    pub fn is_misplaced(&self) -> bool {
        matches!(self, SpliceOutcome::Misplaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(times: &[u64]) -> Chain {
        let events = times
            .iter()
            .enumerate()
            .map(|(i, time)| ChainLink::new(NodeId(i as u64 + 100), *time))
            .collect();
        Chain::with_events(NodeId(1), 0, events)
    }

    #[test]
    fn position_orders_and_breaks_ties_after() {
        let chain = chain_of(&[10, 20, 20, 30]);
        assert_eq!(chain.position(5), 0);
        assert_eq!(chain.position(10), 1);
        assert_eq!(chain.position(20), 3);
        assert_eq!(chain.position(25), 3);
        assert_eq!(chain.position(31), 4);
        assert_eq!(Chain::new(NodeId(1), 0).position(7), 0);
    }

    #[test]
    fn select_picks_latest_anchor_not_after() {
        let index = ChainIndex::from_chains(vec![
            Chain::new(NodeId(2), 50),
            Chain::new(NodeId(1), 10),
        ]);
        assert_eq!(index.chains()[0].anchor(), NodeId(1));
        assert_eq!(index.select(9), None);
        assert_eq!(index.select(10), Some(0));
        assert_eq!(index.select(49), Some(0));
        assert_eq!(index.select(50), Some(1));
        assert_eq!(ChainIndex::new().select(100), None);
    }
}
