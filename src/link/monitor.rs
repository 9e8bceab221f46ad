//! Connection liveness and throughput tracking
//!
//! The monitor consumes arrival events from the transport session and
//! exposes the current link state plus last-window throughput. Liveness is
//! judged purely by inbound traffic: keep-alive send failures never change
//! state here.

use crate::types::{ConnectionState, RateMetrics};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Width of the rolling throughput window
const RATE_WINDOW: Duration = Duration::from_secs(1);

struct MonitorInner {
    state: ConnectionState,
    last_contact: Option<Instant>,
    window_started: Instant,
    window_samples: u64,
    window_bytes: u64,
    rates: RateMetrics,
}

impl MonitorInner {
    /// Close the current window if it is full and publish its rates.
    fn roll_window(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.window_started);
        if elapsed < RATE_WINDOW {
            return;
        }
        let secs = elapsed.as_secs_f32();
        self.rates = RateMetrics {
            samples_per_sec: self.window_samples as f32 / secs,
            bytes_per_sec: self.window_bytes as f32 / secs,
        };
        self.window_samples = 0;
        self.window_bytes = 0;
        self.window_started = now;
    }
}

/// Tracks link state and throughput from transport session events.
///
/// Shared between the session threads (writers) and any number of snapshot
/// readers; every operation takes one short mutex hold and never blocks on
/// I/O.
pub struct ConnectionMonitor {
    inner: Mutex<MonitorInner>,
    liveness_window: Duration,
}

impl ConnectionMonitor {
    /// Create a monitor in the `Disconnected` state
    pub fn new(liveness_window: Duration) -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                state: ConnectionState::Disconnected,
                last_contact: None,
                window_started: Instant::now(),
                window_samples: 0,
                window_bytes: 0,
                rates: RateMetrics::default(),
            }),
            liveness_window,
        }
    }

    /// Enter `Discovering`, the start of a new handshake cycle.
    ///
    /// Called by the session on start and whenever it tears down a stale
    /// peer; clears throughput so consumers do not read rates from the
    /// previous cycle.
    pub fn start_discovery(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Discovering {
            log::info!("Link state: {} -> discovering", inner.state);
        }
        inner.state = ConnectionState::Discovering;
        inner.last_contact = None;
        inner.window_samples = 0;
        inner.window_bytes = 0;
        inner.rates = RateMetrics::default();
        inner.window_started = Instant::now();
    }

    /// Record the discovery acknowledgment.
    ///
    /// `Discovering -> Connected` is the only entry into `Connected`; an ack
    /// in any other state just refreshes the contact time.
    pub fn on_ack(&self) {
        let mut inner = self.inner.lock();
        inner.last_contact = Some(Instant::now());
        if inner.state == ConnectionState::Discovering {
            inner.state = ConnectionState::Connected;
            log::info!("Link state: discovering -> connected");
        }
    }

    /// Record an inbound datagram of `bytes` carrying `samples` records
    pub fn on_datagram(&self, bytes: usize, samples: usize) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.last_contact = Some(now);
        inner.window_bytes += bytes as u64;
        inner.window_samples += samples as u64;
        inner.roll_window(now);
    }

    /// Periodic tick: degrade a silent `Connected` link to `Stale` and keep
    /// the rate window rolling during silence.
    pub fn on_tick(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.roll_window(now);

        if inner.state == ConnectionState::Connected {
            let silent = inner
                .last_contact
                .map_or(true, |t| now.duration_since(t) > self.liveness_window);
            if silent {
                inner.state = ConnectionState::Stale;
                log::warn!(
                    "Link state: connected -> stale (no traffic for {:?})",
                    self.liveness_window
                );
            }
        }
    }

    /// Current link state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Whether the link is currently `Connected`
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Last-completed-window throughput
    pub fn rates(&self) -> RateMetrics {
        self.inner.lock().rates
    }

    /// Time since the last inbound traffic, if any arrived this cycle
    pub fn last_contact_age(&self) -> Option<Duration> {
        self.inner.lock().last_contact.map(|t| t.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ack_connects_only_from_discovering() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(1));
        assert_eq!(monitor.state(), ConnectionState::Disconnected);

        // Ack while disconnected must not connect
        monitor.on_ack();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);

        monitor.start_discovery();
        monitor.on_ack();
        assert_eq!(monitor.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_silence_past_window_goes_stale() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(30));
        monitor.start_discovery();
        monitor.on_ack();

        thread::sleep(Duration::from_millis(60));
        monitor.on_tick();
        assert_eq!(monitor.state(), ConnectionState::Stale);

        // Session answers staleness by restarting the handshake
        monitor.start_discovery();
        assert_eq!(monitor.state(), ConnectionState::Discovering);
    }

    #[test]
    fn test_traffic_keeps_connection_alive() {
        let monitor = ConnectionMonitor::new(Duration::from_millis(80));
        monitor.start_discovery();
        monitor.on_ack();

        for _ in 0..4 {
            thread::sleep(Duration::from_millis(20));
            monitor.on_datagram(64, 4);
            monitor.on_tick();
        }
        assert_eq!(monitor.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_rate_window_computes_per_second_figures() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(5));
        monitor.start_discovery();
        monitor.on_ack();

        monitor.on_datagram(100, 10);
        monitor.on_datagram(100, 10);
        assert_eq!(monitor.rates(), RateMetrics::default());

        thread::sleep(RATE_WINDOW + Duration::from_millis(50));
        monitor.on_datagram(100, 10);

        let rates = monitor.rates();
        assert!(rates.samples_per_sec > 0.0);
        assert!(rates.bytes_per_sec > 0.0);
        // 300 bytes / ~1.05s, allow generous slack for scheduling
        assert!(rates.bytes_per_sec <= 300.0);
        assert!(rates.samples_per_sec <= 30.0);
    }

    #[test]
    fn test_discovery_reset_clears_rates() {
        let monitor = ConnectionMonitor::new(Duration::from_secs(5));
        monitor.start_discovery();
        monitor.on_ack();
        monitor.on_datagram(1000, 100);
        thread::sleep(RATE_WINDOW + Duration::from_millis(50));
        monitor.on_tick();

        monitor.start_discovery();
        assert_eq!(monitor.rates(), RateMetrics::default());
        assert!(monitor.last_contact_age().is_none());
    }
}
