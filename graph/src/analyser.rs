use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use opus_shared::{
    AggregationMessage, FuncInfoMessage, GenericMessage, PayloadType, RawMessage, StartupMessage,
    TermMessage,
};

use crate::{
    chain::{cache::ChainCache, SpliceOutcome},
    error::{AnalyserError, FunctionTableError, StoreError},
    functions::FunctionTable,
    handlers::{record_event, ActionContext, ActionOutcome, HandlerRegistry},
    store::{GraphStore, Mutation, NodeId, NodeKind},
};

/// Running totals, one per kind of result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnalyserStats {
    pub messages: usize,
    pub processes: usize,
    pub anchors: usize,
    pub events: usize,
    pub misplaced: usize,
    pub meta: usize,
    pub ignored: usize,
    pub disconnects: usize,
    pub failures: usize,
}

/// Downstream consumer of collector batches.
///
/// Owns the store, the chain cache and the pid to process-node map. A
/// failing message is logged and counted; the rest of its batch still runs.
pub struct Analyser<S: GraphStore> {
    store: S,
    table: FunctionTable,
    registry: HandlerRegistry,
    cache: ChainCache,
    processes: HashMap<i32, NodeId>,
    stats: AnalyserStats,
}

impl<S: GraphStore> Analyser<S> {
    pub fn new(store: S, table: FunctionTable, registry: HandlerRegistry) -> Self {
        Self {
            store,
            table,
            registry,
            cache: ChainCache::new(),
            processes: HashMap::new(),
            stats: AnalyserStats::default(),
        }
    }

    /// Analyser over the embedded POSIX function table
    pub fn posix(store: S) -> Result<Self, FunctionTableError> {
        Ok(Self::new(store, FunctionTable::posix()?, HandlerRegistry::posix()))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn cache(&self) -> &ChainCache {
        &self.cache
    }

    pub fn stats(&self) -> AnalyserStats {
        self.stats
    }

    pub fn process_node(&self, pid: i32) -> Option<NodeId> {
        self.processes.get(&pid).copied()
    }

    /// Drains batches until the source ends
    pub fn run<I, B>(&mut self, batches: I)
    where
        I: IntoIterator<Item = B>,
        B: IntoIterator<Item = RawMessage>,
    {
        info!("Analyser started");
        for batch in batches {
            self.analyse_batch(batch);
        }
        info!("Analyser stopped: {:?}", self.stats);
    }

    /// Returns how many messages were looked at
    pub fn analyse_batch<B: IntoIterator<Item = RawMessage>>(&mut self, batch: B) -> usize {
        let mut count = 0;
        for message in batch {
            count += 1;
            if let Err(err) = self.analyse(&message) {
                self.stats.failures += 1;
                warn!("Failed to analyse message from pid {}: {}", message.pid(), err);
            }
        }
        count
    }

    pub fn analyse(&mut self, message: &RawMessage) -> Result<(), AnalyserError> {
        self.stats.messages += 1;
        let pid = message.pid();

        match message.kind()? {
            PayloadType::Startup => {
                let startup: StartupMessage = message.decode()?;
                self.store.set_mono_time_for_msg(message.header().timestamp);
                self.startup(pid, &startup)
            }
            PayloadType::FuncInfo => {
                let call: FuncInfoMessage = message.decode()?;
                self.func_info(pid, &call)
            }
            PayloadType::Aggregation => {
                let aggregate: AggregationMessage = message.decode()?;
                self.aggregation(pid, &aggregate)
            }
            PayloadType::Generic => {
                let generic: GenericMessage = message.decode()?;
                if generic.is_disconnect() {
                    self.stats.disconnects += 1;
                    self.end_session(pid);
                } else {
                    self.stats.ignored += 1;
                }
                Ok(())
            }
            PayloadType::Term => {
                let term: TermMessage = message.decode()?;
                self.store.set_mono_time_for_msg(message.header().timestamp);
                self.term(pid, &term)
            }
            PayloadType::LibInfo => {
                self.stats.ignored += 1;
                Ok(())
            }
        }
    }

    fn process(&mut self, pid: i32) -> Result<NodeId, StoreError> {
        if let Some(node) = self.processes.get(&pid) {
            return Ok(*node);
        }
        let mut props = Map::new();
        props.insert("pid".to_string(), Value::from(pid));
        let node = self.store.create_node(NodeKind::Process, props)?;
        debug!("pid {} is {}", pid, node.id);

        self.processes.insert(pid, node.id);
        self.stats.processes += 1;
        Ok(node.id)
    }

    fn startup(&mut self, pid: i32, startup: &StartupMessage) -> Result<(), AnalyserError> {
        let process = self.process(pid)?;
        self.store.commit(&[
            Mutation::set(process, "exec_name", startup.exec_name.as_str()),
            Mutation::set(process, "cwd", startup.cwd.as_str()),
            Mutation::set(process, "cmd_line", startup.cmd_line_args.join(" ")),
            Mutation::set(process, "start_time", startup.start_time),
            Mutation::set(process, "ppid", startup.ppid),
        ])?;
        Ok(())
    }

    fn func_info(&mut self, pid: i32, call: &FuncInfoMessage) -> Result<(), AnalyserError> {
        self.store.set_mono_time_for_msg(call.begin_time);
        let process = self.process(pid)?;
        let (action, args) = self.table.bind(call)?;

        let mut context = ActionContext {
            store: &mut self.store,
            cache: &mut self.cache,
            process,
        };
        let outcome = self.registry.dispatch(action, &mut context, call, &args)?;
        self.tally(outcome);
        Ok(())
    }

    fn aggregation(&mut self, pid: i32, aggregate: &AggregationMessage) -> Result<(), AnalyserError> {
        let process = self.process(pid)?;
        for record in &aggregate.messages {
            if let Err(err) = self.aggregate_record(process, record) {
                self.stats.failures += 1;
                warn!("Dropped {} record from pid {}: {}", record.func_name, pid, err);
            }
        }
        Ok(())
    }

    fn aggregate_record(&mut self, process: NodeId, record: &FuncInfoMessage) -> Result<(), AnalyserError> {
        let descriptor = self.table.descriptor(record)?;
        self.store.set_mono_time_for_msg(record.begin_time);

        let outcome = record_event(&mut self.store, &mut self.cache, process, &descriptor, record)?;
        self.tally(ActionOutcome::Spliced(outcome));
        Ok(())
    }

    fn term(&mut self, pid: i32, term: &TermMessage) -> Result<(), AnalyserError> {
        let Some(process) = self.process_node(pid) else {
            return Ok(());
        };
        self.store
            .commit(&[Mutation::set(process, "exit_status", term.exit_status)])?;
        self.cache.invalidate_process(process);
        Ok(())
    }

    fn end_session(&mut self, pid: i32) {
        if let Some(process) = self.processes.remove(&pid) {
            debug!("session of pid {} ended", pid);
            self.cache.invalidate_process(process);
        }
    }

    fn tally(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Anchored { .. } => self.stats.anchors += 1,
            ActionOutcome::Spliced(SpliceOutcome::Spliced { .. }) => self.stats.events += 1,
            ActionOutcome::Spliced(SpliceOutcome::Misplaced) => self.stats.misplaced += 1,
            ActionOutcome::Recorded { .. } => self.stats.meta += 1,
            ActionOutcome::Skipped | ActionOutcome::Ignored => self.stats.ignored += 1,
        }
    }
}
