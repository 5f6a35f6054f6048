use std::{default::Default, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use opus_shared::MAX_PAYLOAD_SIZE;

use crate::{error::OpusServerError, transport::ListenAddr};

/// Longest single readiness wait `poll(2)` accepts
pub const MAX_POLL_TIMEOUT_MS: u128 = i32::MAX as u128;

/// Contains Config properties which will be used by the collector
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address instrumented processes connect to
    pub listen_addr: ListenAddr,
    /// Pending-connection queue length handed to `listen(2)`
    pub backlog: i32,
    /// Upper bound on one readiness wait. Also bounds how long a stop request
    /// or a bridged command waits before the worker notices it.
    #[serde(rename = "poll_timeout_ms", with = "millis")]
    pub poll_timeout: Duration,
    /// Largest payload a client may declare in a header. Never above
    /// `MAX_PAYLOAD_SIZE`.
    pub max_payload_len: usize,
    /// How long a control request may wait on the command bridge before it
    /// is reported as contention. `None` waits indefinitely.
    #[serde(rename = "bridge_wait_ceiling_ms", with = "opt_millis")]
    pub bridge_wait_ceiling: Option<Duration>,
    /// Where the command-and-control listener binds, if at all
    pub control_addr: Option<ListenAddr>,
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, OpusServerError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|err| OpusServerError::Config {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, OpusServerError> {
        let yaml = fs::read_to_string(path).map_err(|err| OpusServerError::Config {
            reason: format!("cannot read {}: {}", path.display(), err),
        })?;
        Self::from_yaml(&yaml)
    }

    /// Rejects limits the collector cannot honour.
    pub fn validate(&self) -> Result<(), OpusServerError> {
        if self.max_payload_len > MAX_PAYLOAD_SIZE {
            return Err(OpusServerError::Config {
                reason: format!(
                    "max_payload_len {} exceeds the ceiling of {} bytes",
                    self.max_payload_len, MAX_PAYLOAD_SIZE
                ),
            });
        }
        if self.poll_timeout.as_millis() > MAX_POLL_TIMEOUT_MS {
            return Err(OpusServerError::Config {
                reason: format!(
                    "poll_timeout_ms {} exceeds {}",
                    self.poll_timeout.as_millis(),
                    MAX_POLL_TIMEOUT_MS
                ),
            });
        }
        if self.backlog < 0 {
            return Err(OpusServerError::Config {
                reason: format!("backlog {} is negative", self.backlog),
            });
        }
        Ok(())
    }

    pub fn with_listen_addr(mut self, listen_addr: ListenAddr) -> Self {
        self.listen_addr = listen_addr;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ListenAddr::tcp("localhost:10101"),
            backlog: 10,
            poll_timeout: Duration::from_secs(5),
            max_payload_len: MAX_PAYLOAD_SIZE,
            bridge_wait_ceiling: Some(Duration::from_secs(30)),
            control_addr: None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
