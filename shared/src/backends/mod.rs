mod timestamp;

pub use timestamp::{mono_time_in_nanos, Timestamp, TimeError};
