//! Application orchestration for the KampanIO daemon
//!
//! Wires the monitor, store and link session together, runs the main loop,
//! and exposes the two operator procedures (calibration, axis remap) to the
//! presentation layer.

use crate::calibration::{run_axis_mapping, run_calibration};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::link::{ConnectionMonitor, LinkSession};
use crate::store::{TelemetrySnapshot, TelemetryStore};
use crate::types::{AxisMapping, CalibrationProfile, LogicalAxis};
use crossbeam_channel::RecvTimeoutError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Interval between statistics log lines in the main loop
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Main application structure that manages all components
pub struct KampanApp {
    config: AppConfig,
    store: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    session: LinkSession,
    running: Arc<AtomicBool>,
}

impl KampanApp {
    /// Create a new app instance from configuration
    pub fn new(config: AppConfig) -> Self {
        let monitor = Arc::new(ConnectionMonitor::new(config.link.liveness_window()));
        let store = Arc::new(TelemetryStore::new(Arc::clone(&monitor)));
        let session = LinkSession::from_config(&config, Arc::clone(&store), Arc::clone(&monitor));

        Self {
            config,
            store,
            monitor,
            session,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared handle to the telemetry store for consumer threads
    pub fn store(&self) -> Arc<TelemetryStore> {
        Arc::clone(&self.store)
    }

    /// Consumer-facing snapshot passthrough
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.store.snapshot()
    }

    /// Start the link and block until shutdown is signalled
    pub fn run(&mut self) -> Result<()> {
        self.session.start()?;

        let r = Arc::clone(&self.running);
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            r.store(false, Ordering::Relaxed);
        })
        .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {e}")))?;

        log::info!("KampanIO running. Press Ctrl-C to stop.");

        let mut last_stats = Instant::now();
        while self.running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(100));

            if last_stats.elapsed() >= STATS_INTERVAL {
                self.log_statistics();
                last_stats = Instant::now();
            }
        }

        log::info!("Shutting down...");
        self.session.stop();
        Ok(())
    }

    /// Ask the main loop to exit (for embedding; Ctrl-C does the same)
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Run one calibration pass over the live stream.
    ///
    /// A valid profile is installed in the store before returning; an
    /// invalid one is returned untouched so the caller can show the
    /// variance and offer a retry.
    pub fn calibrate(&self) -> Result<CalibrationProfile> {
        let samples = self.store.subscribe();
        let profile = run_calibration(&samples, &self.monitor, &self.config.calibration)?;
        if profile.valid {
            self.store.apply_calibration(profile)?;
        }
        Ok(profile)
    }

    /// Run the guided axis remap.
    ///
    /// `prompt` blocks per axis until the operator is ready. On success the
    /// mapping is installed; on `Error::NotBijective` the previous mapping
    /// stays in effect.
    pub fn remap_axes<P>(&self, prompt: P) -> Result<AxisMapping>
    where
        P: FnMut(LogicalAxis) -> Result<()>,
    {
        if !self.monitor.is_connected() {
            return Err(Error::NotConnected);
        }

        let samples = self.store.subscribe();
        let timeout = self.config.calibration.sample_timeout();
        let mapping = run_axis_mapping(prompt, || match samples.recv_timeout(timeout) {
            Ok(corrected) => Ok(corrected.raw),
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        })?;

        self.store.apply_mapping(mapping);
        Ok(mapping)
    }

    fn log_statistics(&self) {
        let snapshot = self.store.snapshot();
        log::info!(
            "Link {} | {:.0} samples/s, {:.0} B/s | {} subscriber(s)",
            snapshot.connection,
            snapshot.rates.samples_per_sec,
            snapshot.rates.bytes_per_sec,
            self.store.subscriber_count()
        );
    }
}
