// Message size ceilings

/// Largest payload a collector will buffer for a single framed message.
///
/// A header declaring more than this is rejected before any payload bytes are
/// read, so a corrupt or hostile peer cannot make the collector allocate
/// without bound. Aggregated payloads from the interposition library are
/// capped well below this (64 KiB by default).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024; // 1 MiB

/// Largest body accepted on the command-and-control channel.
pub const MAX_CONTROL_MESSAGE_SIZE: usize = 1024 * 1024; // 1 MiB
