mod server_config;
mod worker;

pub use server_config::ServerConfig;
pub use worker::{IngestionWorker, WorkerHandle};
