//! Telemetry link sessions
//!
//! A session owns the socket and the worker threads around it: discovery,
//! keep-alive and the receive loop for the datagram transport, or the
//! connect/reconnect loop for the stream transport. Sessions have an
//! explicit lifecycle (create, start, stop) - no process-wide sockets.

mod monitor;
mod tcp;
mod udp;

pub use monitor::ConnectionMonitor;
pub use tcp::TcpSession;
pub use udp::UdpSession;

use crate::config::{AppConfig, Transport};
use crate::error::Result;
use crate::store::TelemetryStore;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// Socket read timeout; bounds how long a blocking read can delay a
/// shutdown or staleness check.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Keep-alive thread tick; drives staleness checks between sends.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Pause before re-entering discovery after a failed cycle.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Read errors that just mean "nothing arrived yet"
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// A transport session of either flavor
pub enum LinkSession {
    /// Datagram link with discovery and keep-alive
    Udp(UdpSession),
    /// Reliable stream link with reconnect
    Tcp(TcpSession),
}

impl LinkSession {
    /// Build the session the configuration asks for
    pub fn from_config(
        config: &AppConfig,
        store: Arc<TelemetryStore>,
        monitor: Arc<ConnectionMonitor>,
    ) -> Self {
        match config.link.transport {
            Transport::Udp => LinkSession::Udp(UdpSession::new(
                config.link.clone(),
                config.records.clone(),
                store,
                monitor,
            )),
            Transport::Tcp => LinkSession::Tcp(TcpSession::new(
                config.link.clone(),
                config.records.clone(),
                store,
                monitor,
            )),
        }
    }

    /// Start the session's worker threads
    pub fn start(&mut self) -> Result<()> {
        match self {
            LinkSession::Udp(s) => s.start(),
            LinkSession::Tcp(s) => s.start(),
        }
    }

    /// Signal the workers to stop and join them
    pub fn stop(&mut self) {
        match self {
            LinkSession::Udp(s) => s.stop(),
            LinkSession::Tcp(s) => s.stop(),
        }
    }
}
