//! Stream transport session (reliable binary variant)
//!
//! Some firmware builds push fixed-size binary records over a TCP stream
//! instead of datagrams. There is no discovery token here - establishing
//! the connection is the handshake - and no keep-alive; the session
//! reconnects whenever the stream goes stale or closes.
//!
//! Reads accumulate into exactly one record-aligned buffer before parsing:
//! a short read is never handed to the record parser.

use super::{is_transient, ConnectionMonitor, RETRY_DELAY, READ_TIMEOUT};
use crate::config::{LinkConfig, RecordConfig};
use crate::error::{Error, Result};
use crate::protocol::{parse_records, BinaryLayout, RecordFormat};
use crate::store::TelemetryStore;
use crate::types::ConnectionState;
use std::io::Read;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Stream link session with explicit lifecycle.
pub struct TcpSession {
    link: LinkConfig,
    layout: BinaryLayout,
    store: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl TcpSession {
    /// Create a session; nothing connects until `start`.
    ///
    /// The stream transport always carries binary records; a text format in
    /// the configuration falls back to the classic 16-byte layout.
    pub fn new(
        link: LinkConfig,
        records: RecordConfig,
        store: Arc<TelemetryStore>,
        monitor: Arc<ConnectionMonitor>,
    ) -> Self {
        let layout = match records.format {
            RecordFormat::BinaryCounted => BinaryLayout::Counted,
            RecordFormat::Binary => BinaryLayout::Classic,
            RecordFormat::Text => {
                log::warn!("Stream transport carries binary records; using classic layout");
                BinaryLayout::Classic
            }
        };
        Self {
            link,
            layout,
            store,
            monitor,
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// Spawn the connect/read thread
    pub fn start(&mut self) -> Result<()> {
        let target: SocketAddr = self.link.peer_address.parse().map_err(|e| {
            Error::InvalidParameter(format!("peer_address {:?}: {e}", self.link.peer_address))
        })?;

        self.shutdown.store(false, Ordering::Relaxed);

        let link = self.link.clone();
        let layout = self.layout;
        let store = Arc::clone(&self.store);
        let monitor = Arc::clone(&self.monitor);
        let shutdown = Arc::clone(&self.shutdown);
        let handle = thread::Builder::new()
            .name("link-rx".to_string())
            .spawn(move || stream_loop(link, layout, target, store, monitor, shutdown))?;

        self.threads.push(handle);
        Ok(())
    }

    /// Signal the thread to stop and join it
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        log::info!("Stream session stopped");
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Connect, read record-aligned buffers, reconnect on staleness or close.
fn stream_loop(
    link: LinkConfig,
    layout: BinaryLayout,
    target: SocketAddr,
    store: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    shutdown: Arc<AtomicBool>,
) {
    let buffer_len = layout.record_size() * link.stream_batch_records.max(1);

    while !shutdown.load(Ordering::Relaxed) {
        monitor.start_discovery();
        log::info!("Connecting to {target}");

        match TcpStream::connect_timeout(&target, link.discovery_timeout()) {
            Ok(mut stream) => {
                if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
                    log::error!("Failed to set read timeout: {e}");
                    continue;
                }
                let _ = stream.set_nodelay(true);
                monitor.on_ack();
                log::info!("Stream connected to {target}");

                read_records(
                    &mut stream,
                    buffer_len,
                    layout,
                    &store,
                    &monitor,
                    &shutdown,
                );
            }
            Err(e) => log::warn!("Connect to {target} failed: {e}"),
        }

        if !shutdown.load(Ordering::Relaxed) {
            thread::sleep(RETRY_DELAY);
        }
    }

    log::info!("Stream thread exiting");
}

/// Inner read loop for one established connection.
fn read_records(
    stream: &mut TcpStream,
    buffer_len: usize,
    layout: BinaryLayout,
    store: &TelemetryStore,
    monitor: &ConnectionMonitor,
    shutdown: &AtomicBool,
) {
    let mut buf = vec![0u8; buffer_len];
    let mut filled = 0usize;

    while !shutdown.load(Ordering::Relaxed) {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                log::warn!("Peer closed stream");
                return;
            }
            Ok(n) => {
                filled += n;
                if filled < buf.len() {
                    continue;
                }
                let (samples, _) = parse_records(layout, &buf);
                let count = samples.len();
                for sample in samples {
                    store.publish(sample);
                }
                monitor.on_datagram(buf.len(), count);
                filled = 0;
            }
            Err(e) if is_transient(&e) => {
                monitor.on_tick();
                if monitor.state() == ConnectionState::Stale {
                    log::warn!("Stream stale, reconnecting");
                    return;
                }
            }
            Err(e) => {
                log::error!("Stream read error: {e}");
                return;
            }
        }
    }
}
