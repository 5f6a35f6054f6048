use std::time::SystemTime;

/// Error type for timestamp operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// System time is before UNIX epoch
    SystemTimeBeforeEpoch,
}

impl std::fmt::Display for TimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeError::SystemTimeBeforeEpoch => {
                write!(f, "System time is before UNIX epoch")
            }
        }
    }
}

impl std::error::Error for TimeError {}

pub struct Timestamp;

impl Timestamp {
    /// Returns the current wall-clock time in seconds since UNIX epoch.
    ///
    /// # Errors
    /// Returns `TimeError::SystemTimeBeforeEpoch` if system time is before UNIX epoch.
    pub fn try_now() -> Result<u64, TimeError> {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|_| TimeError::SystemTimeBeforeEpoch)
    }

    /// Wall-clock seconds, or 0 when the clock is unusable.
    pub fn now_or_zero() -> u64 {
        Self::try_now().unwrap_or(0)
    }
}

cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use nix::time::{clock_gettime, ClockId};

        const MONO_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC_RAW;
    }
    else if #[cfg(unix)]
    {
        use nix::time::{clock_gettime, ClockId};

        const MONO_CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;
    }
}

cfg_if! {
    if #[cfg(unix)]
    {
        use log::error;

        /// Monotonic time in nanoseconds, 0 if the clock cannot be read.
        pub fn mono_time_in_nanos() -> u64 {
            match clock_gettime(MONO_CLOCK) {
                Ok(spec) => {
                    let secs = u64::try_from(spec.tv_sec()).unwrap_or(0);
                    let nanos = u64::try_from(spec.tv_nsec()).unwrap_or(0);
                    secs.saturating_mul(1_000_000_000).saturating_add(nanos)
                }
                Err(errno) => {
                    error!("monotonic clock unavailable: {}", errno);
                    0
                }
            }
        }
    }
    else
    {
        /// Monotonic time in nanoseconds; this platform has no raw monotonic clock.
        pub fn mono_time_in_nanos() -> u64 {
            0
        }
    }
}
