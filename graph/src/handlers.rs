use std::collections::HashMap;

use log::{trace, warn};
use serde_json::{Map, Value};

use opus_shared::FuncInfoMessage;

use crate::{
    chain::{cache::ChainCache, ChainLink, SpliceOutcome, BEFORE_TIME},
    error::AnalyserError,
    functions::{Action, BoundArgs, FILEDES},
    store::{GraphStore, Mutation, NodeId, NodeKind, RelType, MONO_TIME, NAME},
};

/// What a handler works against
pub struct ActionContext<'a> {
    pub store: &'a mut dyn GraphStore,
    pub cache: &'a mut ChainCache,
    pub process: NodeId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Anchored { local: NodeId },
    Spliced(SpliceOutcome),
    Recorded { meta: NodeId },
    /// Call failed, nothing recorded
    Skipped,
    Ignored,
}

pub type Handler =
    fn(&mut ActionContext<'_>, &FuncInfoMessage, &BoundArgs) -> Result<ActionOutcome, AnalyserError>;

/// Action to handler table. Built up front, read-only once handed to the
/// analyser.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Action, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posix() -> Self {
        Self::new()
            .with(Action::Open, open_action)
            .with(Action::Event, event_action)
            .with(Action::Process, process_action)
            .with(Action::None, none_action)
    }

    pub fn with(mut self, action: Action, handler: Handler) -> Self {
        self.handlers.insert(action, handler);
        self
    }

    pub fn get(&self, action: Action) -> Result<Handler, AnalyserError> {
        self.handlers
            .get(&action)
            .copied()
            .ok_or(AnalyserError::UnhandledAction {
                action: action.name(),
            })
    }

    pub fn dispatch(
        &self,
        action: Action,
        context: &mut ActionContext<'_>,
        msg: &FuncInfoMessage,
        args: &BoundArgs,
    ) -> Result<ActionOutcome, AnalyserError> {
        let handler = self.get(action)?;
        trace!("{} -> {}", msg.func_name, action.name());
        handler(context, msg, args)
    }
}

/// Event node for one call, stamped with its ordering key
fn create_event(
    store: &mut dyn GraphStore,
    msg: &FuncInfoMessage,
) -> Result<ChainLink, AnalyserError> {
    let mut props = Map::new();
    props.insert("fn".to_string(), Value::from(msg.func_name.as_str()));
    props.insert(BEFORE_TIME.to_string(), Value::from(msg.begin_time));
    props.insert("after_time".to_string(), Value::from(msg.end_time));
    props.insert("ret".to_string(), Value::from(msg.ret_val));
    props.insert("errno".to_string(), Value::from(msg.error_num));
    if let Some(hash) = &msg.git_hash {
        props.insert("git_hash".to_string(), Value::from(hash.as_str()));
    }

    let node = store.create_node(NodeKind::Event, props)?;
    Ok(ChainLink::new(node.id, msg.begin_time))
}

/// Creates the event node for `msg` and splices it into its chain.
///
/// Nothing is written for a misplaced event, and the event node is removed
/// again when the splice commit is rejected.
pub(crate) fn record_event(
    store: &mut dyn GraphStore,
    cache: &mut ChainCache,
    process: NodeId,
    descriptor: &str,
    msg: &FuncInfoMessage,
) -> Result<SpliceOutcome, AnalyserError> {
    if cache
        .anchor_for(store, process, descriptor, msg.begin_time)?
        .is_none()
    {
        warn!(
            "Misplaced message: {} at {} predates every anchor of {} for {}",
            msg.func_name, msg.begin_time, descriptor, process
        );
        return Ok(SpliceOutcome::Misplaced);
    }

    let link = create_event(store, msg)?;
    match cache.splice(store, process, descriptor, link) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            if let Err(cleanup) = store.delete_node(link.node) {
                warn!("could not remove unlinked {}: {}", link.node, cleanup);
            }
            Err(err.into())
        }
    }
}

fn open_action(
    context: &mut ActionContext<'_>,
    msg: &FuncInfoMessage,
    args: &BoundArgs,
) -> Result<ActionOutcome, AnalyserError> {
    if msg.error_num != 0 {
        return Ok(ActionOutcome::Skipped);
    }
    let descriptor = args.require(FILEDES)?;

    let mut props = Map::new();
    props.insert(NAME.to_string(), Value::from(descriptor));
    props.insert(MONO_TIME.to_string(), Value::from(msg.begin_time));
    let local = context.store.create_node(NodeKind::Local, props)?;

    let mut mutations = vec![Mutation::link(local.id, context.process, RelType::ProcObj)];
    if let Some(path) = args.get("path") {
        let mut props = Map::new();
        props.insert(NAME.to_string(), Value::from(path));
        let global = context.store.create_node(NodeKind::Global, props)?;
        mutations.push(Mutation::link(global.id, local.id, RelType::LocObj));
    }
    context.store.commit(&mutations)?;

    // the new anchor only shows up in chains once they are reloaded
    context.cache.invalidate(context.process, descriptor);
    Ok(ActionOutcome::Anchored { local: local.id })
}

fn event_action(
    context: &mut ActionContext<'_>,
    msg: &FuncInfoMessage,
    args: &BoundArgs,
) -> Result<ActionOutcome, AnalyserError> {
    let descriptor = args.require(FILEDES)?;
    let outcome = record_event(context.store, context.cache, context.process, descriptor, msg)?;
    Ok(ActionOutcome::Spliced(outcome))
}

fn process_action(
    context: &mut ActionContext<'_>,
    _msg: &FuncInfoMessage,
    args: &BoundArgs,
) -> Result<ActionOutcome, AnalyserError> {
    let key = args.require("key")?;
    let value = args.require("value")?;

    let mut props = Map::new();
    props.insert(NAME.to_string(), Value::from(key));
    props.insert("value".to_string(), Value::from(value));
    let meta = context.store.create_node(NodeKind::Meta, props)?;
    context
        .store
        .commit(&[Mutation::link(context.process, meta.id, RelType::ProcMeta)])?;
    Ok(ActionOutcome::Recorded { meta: meta.id })
}

fn none_action(
    _context: &mut ActionContext<'_>,
    _msg: &FuncInfoMessage,
    _args: &BoundArgs,
) -> Result<ActionOutcome, AnalyserError> {
    Ok(ActionOutcome::Ignored)
}
