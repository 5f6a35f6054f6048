use std::time::{Duration, Instant};

use log::debug;
use tempfile::TempDir;

use opus_client::{ControlClient, FrameSender, ServerAddr};
use opus_server::{
    transport::{BatchReceiver, ListenAddr},
    Command, IngestionWorker, ServerConfig, WorkerHandle,
};
use opus_shared::RawMessage;

const DEADLINE: Duration = Duration::from_secs(5);

/// Ingestion worker bound to sockets in its own temporary directory
pub struct Collector {
    handle: Option<WorkerHandle>,
    receiver: BatchReceiver,
    _dir: TempDir,
}

impl Collector {
    pub fn start() -> Self {
        Self::launch(false)
    }

    /// Also binds the command-and-control listener
    pub fn start_with_control() -> Self {
        Self::launch(true)
    }

    fn launch(control: bool) -> Self {
        let _ = env_logger_init();
        let dir = tempfile::tempdir().expect("tempdir");
        let control_addr = control.then(|| ListenAddr::unix(dir.path().join("control.sock")));
        let config = ServerConfig {
            poll_timeout: Duration::from_millis(20),
            bridge_wait_ceiling: Some(DEADLINE),
            control_addr,
            ..ServerConfig::default()
        }
        .with_listen_addr(ListenAddr::unix(dir.path().join("collector.sock")));

        let (handle, receiver) = IngestionWorker::spawn(&config).expect("spawn collector");
        debug!("test collector listening on {}", handle.local_addr());
        Self {
            handle: Some(handle),
            receiver,
            _dir: dir,
        }
    }

    pub fn handle(&self) -> &WorkerHandle {
        self.handle.as_ref().expect("collector already stopped")
    }

    pub fn receiver(&self) -> &BatchReceiver {
        &self.receiver
    }

    pub fn ingest_addr(&self) -> ServerAddr {
        self.handle()
            .local_addr()
            .to_string()
            .parse()
            .expect("ingest address")
    }

    pub fn sender(&self) -> FrameSender {
        FrameSender::connect(&self.ingest_addr()).expect("connect to collector")
    }

    pub fn control_client(&self) -> ControlClient {
        let addr = self
            .handle()
            .control_addr()
            .expect("collector started without control")
            .to_string()
            .parse()
            .expect("control address");
        ControlClient::new(addr)
    }

    /// Waits until the worker has accepted `count` connections
    pub fn wait_for_connections(&self, count: usize) {
        let deadline = Instant::now() + DEADLINE;
        loop {
            let response = self.handle().submit(Command::Status).expect("status");
            let connections = response.producer.map(|producer| producer.connections);
            if connections == Some(count) {
                return;
            }
            assert!(Instant::now() < deadline, "collector never saw {} connections", count);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Gathers forwarded messages until `done` holds for all of them
    pub fn collect_until(&self, mut done: impl FnMut(&[RawMessage]) -> bool) -> Vec<RawMessage> {
        let deadline = Instant::now() + DEADLINE;
        let mut collected = Vec::new();
        while !done(&collected) {
            assert!(Instant::now() < deadline, "timed out waiting for batches");
            if let Some(batch) = self
                .receiver
                .receive_timeout(Duration::from_millis(50))
                .expect("batch channel")
            {
                collected.extend(batch);
            }
        }
        collected
    }

    /// Stops the worker and returns whatever it forwarded but nobody read
    pub fn stop(mut self) -> Vec<RawMessage> {
        if let Some(handle) = self.handle.take() {
            handle.stop().expect("worker exited cleanly");
        }
        let mut rest = Vec::new();
        while let Ok(Some(batch)) = self.receiver.try_receive() {
            rest.extend(batch);
        }
        rest
    }
}

fn env_logger_init() -> Result<(), log::SetLoggerError> {
    env_logger::builder().is_test(true).try_init()
}
