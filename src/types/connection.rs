//! Connection state and throughput metrics

/// Link state as tracked by the connection monitor.
///
/// The only entry into `Connected` is an acknowledgment received while
/// `Discovering`; silence beyond the liveness window degrades `Connected`
/// to `Stale`, and the transport session answers staleness by restarting
/// discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No discovery cycle has started
    #[default]
    Disconnected,
    /// Handshake in progress
    Discovering,
    /// Acknowledged peer, traffic within the liveness window
    Connected,
    /// Peer acknowledged but silent past the liveness window
    Stale,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Discovering => write!(f, "discovering"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Stale => write!(f, "stale"),
        }
    }
}

/// Last-completed-window throughput figures.
///
/// These are the values from the most recent full rolling window, not live
/// counters - reading them never blocks the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateMetrics {
    /// Parsed samples per second
    pub samples_per_sec: f32,
    /// Payload bytes per second
    pub bytes_per_sec: f32,
}
