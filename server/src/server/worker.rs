use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{error, info, warn};

use opus_shared::{ControlResponse, ProducerStatus, RawMessage};

use super::ServerConfig;
use crate::{
    command::{Command, CommandBridge, ControlServer},
    error::OpusServerError,
    events::IngestBatch,
    multiplexer::Multiplexer,
    transport::{BatchChannel, BatchReceiver, BatchSender, ListenAddr},
};

/// Run loop that owns the [`Multiplexer`]: poll, answer a bridged command,
/// forward what the iteration produced.
pub struct IngestionWorker {
    multiplexer: Multiplexer,
    bridge: Arc<CommandBridge>,
    sender: BatchSender,
    stop: Arc<AtomicBool>,
    iteration: u64,
}

impl IngestionWorker {
    pub fn new(
        multiplexer: Multiplexer,
        bridge: Arc<CommandBridge>,
        sender: BatchSender,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            multiplexer,
            bridge,
            sender,
            stop,
            iteration: 0,
        }
    }

    /// Binds the collector and starts the worker (and, if configured, the
    /// control listener) on their own threads.
    pub fn spawn(config: &ServerConfig) -> Result<(WorkerHandle, BatchReceiver), OpusServerError> {
        let multiplexer = Multiplexer::bind(config)?;
        let local_addr = multiplexer.local_addr().clone();
        let bridge = Arc::new(CommandBridge::new(config.bridge_wait_ceiling));
        let stop = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = BatchChannel::unbounded();

        let control = match &config.control_addr {
            Some(addr) => Some(ControlServer::spawn(addr, bridge.clone())?),
            None => None,
        };

        let worker = IngestionWorker::new(multiplexer, bridge.clone(), sender, stop.clone());
        let thread = thread::Builder::new()
            .name("opus-ingest".to_string())
            .spawn(move || worker.run())?;

        let handle = WorkerHandle {
            local_addr,
            bridge,
            stop,
            control,
            thread: Some(thread),
        };
        Ok((handle, receiver))
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    /// Runs until the stop flag is raised, then closes the multiplexer.
    pub fn run(mut self) -> Result<(), OpusServerError> {
        info!("ingestion worker started on {}", self.multiplexer.local_addr());

        let result = loop {
            if self.stop.load(Ordering::SeqCst) {
                break Ok(());
            }
            if let Err(err) = self.run_once() {
                error!("ingestion worker stopping: {}", err);
                break Err(err);
            }
        };

        self.bridge.close();
        let mut last = IngestBatch::new(self.iteration);
        last.extend(self.multiplexer.close());
        self.forward(last);

        info!("ingestion worker stopped after {} iterations", self.iteration);
        result
    }

    /// One iteration: readiness wait, bridged command, downstream hand-off.
    pub fn run_once(&mut self) -> Result<(), OpusServerError> {
        self.iteration += 1;
        let mut batch = IngestBatch::new(self.iteration);

        batch.extend(self.multiplexer.poll()?);

        let multiplexer = &mut self.multiplexer;
        let mut command_events = Vec::new();
        self.bridge
            .service(|command| execute(multiplexer, command, &mut command_events));
        batch.extend(command_events);

        self.forward(batch);
        Ok(())
    }

    fn forward(&self, batch: IngestBatch) {
        if batch.is_empty() {
            return;
        }
        if self.sender.send(batch).is_err() {
            warn!("downstream consumer has gone away; dropping batch");
        }
    }
}

/// Answers one administrative command against the multiplexer.
pub(crate) fn execute(
    multiplexer: &mut Multiplexer,
    command: Command,
    events: &mut Vec<RawMessage>,
) -> ControlResponse {
    match command {
        Command::Ps => ControlResponse::pid_map(multiplexer.ps()),
        Command::Detach { pid: None } => ControlResponse::failure("Missing pid argument."),
        Command::Detach { pid: Some(pid) } => {
            let result = multiplexer.detach(pid);
            if result.closed == 0 {
                return ControlResponse::failure(format!("Pid {} not connected.", pid));
            }
            events.extend(result.events);
            ControlResponse::success(format!("Success. {} connections closed.", result.closed))
        }
        Command::Status => ControlResponse::producer(ProducerStatus {
            status: "running".to_string(),
            connections: multiplexer.connection_count(),
            owners: multiplexer.owner_count(),
        }),
        Command::Unknown(cmd) => ControlResponse::failure(format!("{} is not a valid command.", cmd)),
    }
}

/// Owner's side of a spawned worker.
pub struct WorkerHandle {
    local_addr: ListenAddr,
    bridge: Arc<CommandBridge>,
    stop: Arc<AtomicBool>,
    control: Option<ControlServer>,
    thread: Option<JoinHandle<Result<(), OpusServerError>>>,
}

impl WorkerHandle {
    pub fn local_addr(&self) -> &ListenAddr {
        &self.local_addr
    }

    pub fn control_addr(&self) -> Option<&ListenAddr> {
        self.control.as_ref().map(ControlServer::local_addr)
    }

    /// Submits a command as the control listener would
    pub fn submit(&self, command: Command) -> Result<ControlResponse, crate::BridgeError> {
        self.bridge.submit(command)
    }

    pub fn bridge(&self) -> Arc<CommandBridge> {
        self.bridge.clone()
    }

    /// Raises the stop flag and waits for the worker to finish. Shutdown
    /// takes at most one poll timeout plus one iteration.
    pub fn stop(mut self) -> Result<(), OpusServerError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), OpusServerError> {
        if let Some(control) = self.control.take() {
            control.shutdown();
        }
        self.stop.store(true, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| OpusServerError::WorkerPanicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("ingestion worker ended with error: {}", err);
        }
    }
}
