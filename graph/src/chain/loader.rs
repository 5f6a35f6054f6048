use log::debug;

use crate::{
    error::ChainError,
    store::{GraphStore, Node, NodeId, Query, MONO_TIME},
};

use super::{Chain, ChainIndex, ChainLink, BEFORE_TIME};

/// Rebuilds every chain of `local_name` under `process` from the store.
///
/// Each row's path comes back latest first; it is reversed so the in-memory
/// chain reads earliest to latest. Chains are ordered by anchor time.
pub fn load_chains(
    store: &mut dyn GraphStore,
    process: NodeId,
    local_name: &str,
    mono_time: u64,
) -> Result<ChainIndex, ChainError> {
    debug!("loading IO event chains for {} of {}", local_name, process);
    store.set_mono_time_for_msg(mono_time);

    let rows = store.query(&Query::EventChains {
        process,
        local_name: local_name.to_string(),
    })?;

    let mut chains = Vec::with_capacity(rows.len());
    for row in rows {
        let anchor_time = row.local.mono_time().ok_or(ChainError::MissingProperty {
            node: row.local.id,
            key: MONO_TIME,
        })?;
        let events = row
            .path
            .iter()
            .rev()
            .map(link_of)
            .collect::<Result<Vec<_>, _>>()?;
        chains.push(Chain::with_events(row.local.id, anchor_time, events));
    }
    Ok(ChainIndex::from_chains(chains))
}

pub(crate) fn link_of(node: &Node) -> Result<ChainLink, ChainError> {
    node.prop_u64(BEFORE_TIME)
        .map(|before_time| ChainLink::new(node.id, before_time))
        .ok_or(ChainError::MissingProperty {
            node: node.id,
            key: BEFORE_TIME,
        })
}
