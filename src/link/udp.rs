//! Datagram transport session
//!
//! Runs the discovery handshake, the keep-alive loop and the receive loop
//! against the device's datagram port. The device streams to whichever
//! address last sent it the discovery token and forgets a client after
//! ~10s of silence, so the keep-alive resends the token on a fixed
//! interval. Liveness is judged purely by inbound traffic.

use super::{is_transient, ConnectionMonitor, RETRY_DELAY, READ_TIMEOUT, TICK_INTERVAL};
use crate::config::{LinkConfig, RecordConfig};
use crate::error::{Error, Result};
use crate::protocol::{
    parse_records, BinaryLayout, RecordFormat, TextFrameParser, ACK_TOKEN, DISCOVERY_TOKEN,
    MAX_DATAGRAM_SIZE,
};
use crate::store::TelemetryStore;
use crate::types::ConnectionState;
use parking_lot::Mutex;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Datagram link session with explicit lifecycle.
pub struct UdpSession {
    link: LinkConfig,
    records: RecordConfig,
    store: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    shutdown: Arc<AtomicBool>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
    threads: Vec<JoinHandle<()>>,
}

impl UdpSession {
    /// Create a session; no socket is bound until `start`
    pub fn new(
        link: LinkConfig,
        records: RecordConfig,
        store: Arc<TelemetryStore>,
        monitor: Arc<ConnectionMonitor>,
    ) -> Self {
        Self {
            link,
            records,
            store,
            monitor,
            shutdown: Arc::new(AtomicBool::new(false)),
            peer: Arc::new(Mutex::new(None)),
            threads: Vec::new(),
        }
    }

    /// Bind the socket and spawn the receive and keep-alive threads
    pub fn start(&mut self) -> Result<()> {
        let target: SocketAddr = self.link.peer_address.parse().map_err(|e| {
            Error::InvalidParameter(format!("peer_address {:?}: {e}", self.link.peer_address))
        })?;

        let socket = UdpSocket::bind(&self.link.bind_address)?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        socket.set_broadcast(true)?;
        log::info!(
            "Datagram socket bound to {} (device at {})",
            socket.local_addr()?,
            target
        );

        self.shutdown.store(false, Ordering::Relaxed);
        *self.peer.lock() = None;

        let rx_socket = socket.try_clone()?;
        let rx = {
            let link = self.link.clone();
            let records = self.records.clone();
            let store = Arc::clone(&self.store);
            let monitor = Arc::clone(&self.monitor);
            let shutdown = Arc::clone(&self.shutdown);
            let peer = Arc::clone(&self.peer);
            thread::Builder::new()
                .name("link-rx".to_string())
                .spawn(move || {
                    receive_loop(rx_socket, link, records, target, store, monitor, shutdown, peer)
                })?
        };

        let ka = {
            let link = self.link.clone();
            let monitor = Arc::clone(&self.monitor);
            let shutdown = Arc::clone(&self.shutdown);
            let peer = Arc::clone(&self.peer);
            thread::Builder::new()
                .name("link-keepalive".to_string())
                .spawn(move || keep_alive_loop(socket, link, monitor, shutdown, peer))?
        };

        self.threads.push(rx);
        self.threads.push(ka);
        Ok(())
    }

    /// Signal the threads to stop and join them.
    ///
    /// The socket read timeout bounds how long a blocked read can hold a
    /// thread up, so this returns promptly.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        log::info!("Datagram session stopped");
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Receive loop: discovery, then datagram intake until stale or shutdown.
#[allow(clippy::too_many_arguments)]
fn receive_loop(
    socket: UdpSocket,
    link: LinkConfig,
    records: RecordConfig,
    target: SocketAddr,
    store: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    shutdown: Arc<AtomicBool>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while !shutdown.load(Ordering::Relaxed) {
        match discover(&socket, &link, target, &monitor, &shutdown, &mut buf) {
            Ok(Some(device)) => *peer.lock() = Some(device),
            Ok(None) => break,
            Err(e) => {
                log::error!("{e}; retrying discovery");
                thread::sleep(RETRY_DELAY);
                continue;
            }
        }

        // Fresh framing state per connection cycle
        let mut text_parser = TextFrameParser::new(records.text_schema);

        while !shutdown.load(Ordering::Relaxed) {
            match socket.recv_from(&mut buf) {
                Ok((len, _src)) => {
                    let payload = &buf[..len];
                    if payload.starts_with(ACK_TOKEN) {
                        // Keep-alive echo - contact, but no records
                        monitor.on_datagram(len, 0);
                        continue;
                    }
                    let samples = match records.format {
                        RecordFormat::Text => text_parser.push(payload),
                        RecordFormat::Binary => parse_records(BinaryLayout::Classic, payload).0,
                        RecordFormat::BinaryCounted => {
                            parse_records(BinaryLayout::Counted, payload).0
                        }
                    };
                    let count = samples.len();
                    for sample in samples {
                        store.publish(sample);
                    }
                    monitor.on_datagram(len, count);
                }
                Err(e) if is_transient(&e) => {
                    if monitor.state() == ConnectionState::Stale {
                        log::warn!("Link stale, tearing down peer and rediscovering");
                        *peer.lock() = None;
                        break;
                    }
                }
                Err(e) => {
                    log::error!("Receive error: {e}; restarting discovery");
                    *peer.lock() = None;
                    break;
                }
            }
        }
    }

    log::info!("Receive thread exiting");
}

/// Discovery handshake with bounded retries.
///
/// Returns the acknowledged device address, `None` if shutdown was observed
/// mid-handshake, or `Error::DiscoveryFailed` once the retries run out.
fn discover(
    socket: &UdpSocket,
    link: &LinkConfig,
    target: SocketAddr,
    monitor: &ConnectionMonitor,
    shutdown: &AtomicBool,
    buf: &mut [u8],
) -> Result<Option<SocketAddr>> {
    monitor.start_discovery();

    for attempt in 1..=link.discovery_retries {
        if shutdown.load(Ordering::Relaxed) {
            return Ok(None);
        }
        log::info!("Discovery attempt {}/{}", attempt, link.discovery_retries);
        if let Err(e) = socket.send_to(DISCOVERY_TOKEN, target) {
            log::warn!("Discovery send failed: {e}");
        }

        let deadline = Instant::now() + link.discovery_timeout();
        while Instant::now() < deadline {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match socket.recv_from(buf) {
                Ok((len, src)) if buf[..len].starts_with(ACK_TOKEN) => {
                    monitor.on_ack();
                    log::info!("Device acknowledged at {src}");
                    return Ok(Some(src));
                }
                // Stray telemetry from a previous cycle; the ack is what
                // opens the connection
                Ok(_) => {}
                Err(e) if is_transient(&e) => {}
                Err(e) => {
                    log::warn!("Discovery receive error: {e}");
                    break;
                }
            }
        }
    }

    Err(Error::DiscoveryFailed {
        attempts: link.discovery_retries,
    })
}

/// Keep-alive loop: periodic token resend plus monitor ticks.
///
/// Send failures are logged and nothing more - liveness is judged by
/// inbound traffic, not by our ability to transmit.
fn keep_alive_loop(
    socket: UdpSocket,
    link: LinkConfig,
    monitor: Arc<ConnectionMonitor>,
    shutdown: Arc<AtomicBool>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
) {
    let mut last_sent = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(TICK_INTERVAL);
        monitor.on_tick();

        if last_sent.elapsed() < link.keep_alive_interval() {
            continue;
        }
        let current = *peer.lock();
        if let Some(device) = current {
            match socket.send_to(DISCOVERY_TOKEN, device) {
                Ok(_) => log::trace!("Keep-alive sent to {device}"),
                Err(e) => log::warn!("Keep-alive send failed: {e}"),
            }
            last_sent = Instant::now();
        }
    }

    log::info!("Keep-alive thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_link(peer: SocketAddr, retries: u32, timeout_ms: u64) -> LinkConfig {
        LinkConfig {
            transport: crate::config::Transport::Udp,
            bind_address: "127.0.0.1:0".to_string(),
            peer_address: peer.to_string(),
            discovery_retries: retries,
            discovery_timeout_ms: timeout_ms,
            keep_alive_interval_ms: 3000,
            liveness_window_ms: 3000,
            stream_batch_records: 1,
        }
    }

    fn bound_socket() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        socket
    }

    #[test]
    fn test_discover_succeeds_on_ack() {
        let device = bound_socket();
        let device_addr = device.local_addr().unwrap();

        let responder = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            loop {
                match device.recv_from(&mut buf) {
                    Ok((len, src)) => {
                        assert_eq!(&buf[..len], DISCOVERY_TOKEN);
                        device.send_to(ACK_TOKEN, src).unwrap();
                        return;
                    }
                    Err(ref e) if is_transient(e) => continue,
                    Err(e) => panic!("device socket error: {e}"),
                }
            }
        });

        let client = bound_socket();
        let link = test_link(device_addr, 5, 1000);
        let monitor = ConnectionMonitor::new(Duration::from_secs(3));
        let shutdown = AtomicBool::new(false);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        let result = discover(&client, &link, device_addr, &monitor, &shutdown, &mut buf);
        assert_eq!(result.unwrap(), Some(device_addr));
        assert_eq!(monitor.state(), ConnectionState::Connected);
        responder.join().unwrap();
    }

    #[test]
    fn test_discover_exhausts_retries_against_silent_peer() {
        // Bound but never answering
        let silent = bound_socket();
        let silent_addr = silent.local_addr().unwrap();

        let client = bound_socket();
        let link = test_link(silent_addr, 2, 50);
        let monitor = ConnectionMonitor::new(Duration::from_secs(3));
        let shutdown = AtomicBool::new(false);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        let err = discover(&client, &link, silent_addr, &monitor, &shutdown, &mut buf).unwrap_err();
        match err {
            Error::DiscoveryFailed { attempts } => assert_eq!(attempts, 2),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(monitor.state(), ConnectionState::Discovering);
    }

    #[test]
    fn test_discover_observes_shutdown() {
        let silent = bound_socket();
        let silent_addr = silent.local_addr().unwrap();

        let client = bound_socket();
        let link = test_link(silent_addr, 5, 5000);
        let monitor = ConnectionMonitor::new(Duration::from_secs(3));
        let shutdown = AtomicBool::new(true);
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];

        let result = discover(&client, &link, silent_addr, &monitor, &shutdown, &mut buf);
        assert_eq!(result.unwrap(), None);
    }
}
