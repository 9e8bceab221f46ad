//! Shared telemetry store
//!
//! Single point of truth for consumers: the latest corrected sample, the
//! applied calibration and axis mapping, and connection health. One writer
//! (the receive loop) publishes; any number of readers take snapshots or
//! drain a bounded subscription channel. Slow subscribers lose samples
//! rather than ever blocking the receive path.

use crate::error::{Error, Result};
use crate::link::ConnectionMonitor;
use crate::types::{
    AxisMapping, CalibrationProfile, ConnectionState, CorrectedSample, RateMetrics, SensorSample,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Subscription channel depth. Small enough that a stalled consumer holds
/// only a moment of data, large enough to ride out scheduling jitter at the
/// device's ~1 kHz sample rate.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 64;

struct StoreInner {
    latest: Option<CorrectedSample>,
    calibration: CalibrationProfile,
    mapping: AxisMapping,
}

/// Read-only view of everything a consumer needs in one call.
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    /// Most recently published corrected sample, if any arrived yet
    pub latest: Option<CorrectedSample>,
    /// Calibration currently applied to published samples
    pub calibration: CalibrationProfile,
    /// Axis mapping currently applied to published samples
    pub mapping: AxisMapping,
    /// Current link state
    pub connection: ConnectionState,
    /// Last-window throughput
    pub rates: RateMetrics,
}

/// Concurrent store publishing corrected samples to consumers.
pub struct TelemetryStore {
    inner: RwLock<StoreInner>,
    subscribers: Mutex<Vec<Sender<CorrectedSample>>>,
    monitor: Arc<ConnectionMonitor>,
}

impl TelemetryStore {
    /// Create a store reading connection health from `monitor`
    pub fn new(monitor: Arc<ConnectionMonitor>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                latest: None,
                calibration: CalibrationProfile::unapplied(),
                mapping: AxisMapping::identity(),
            }),
            subscribers: Mutex::new(Vec::new()),
            monitor,
        }
    }

    /// Correct and publish one raw sample.
    ///
    /// Applies the current mapping (raw channel -> logical axis) and
    /// subtracts that channel's offset; with no valid calibration the
    /// offsets are zero, with no completed remap the mapping is identity.
    /// The stored sample is replaced whole, so a concurrent `snapshot`
    /// sees either the previous or the new sample, never a mix.
    pub fn publish(&self, raw: SensorSample) {
        let corrected = {
            let mut inner = self.inner.write();
            let corrected = correct(&inner.mapping, &inner.calibration, raw);
            inner.latest = Some(corrected);
            corrected
        };
        self.broadcast(corrected);
    }

    /// Install a calibration profile.
    ///
    /// An invalid profile is rejected with `Error::InvalidCalibration`;
    /// offsets in effect remain unchanged.
    pub fn apply_calibration(&self, profile: CalibrationProfile) -> Result<()> {
        if !profile.valid {
            return Err(Error::InvalidCalibration);
        }
        log::info!(
            "Applying calibration: gyro offsets {:?}, accel offsets {:?}",
            profile.gyro_offset,
            profile.accel_offset
        );
        self.inner.write().calibration = profile;
        Ok(())
    }

    /// Atomically replace the axis mapping
    pub fn apply_mapping(&self, mapping: AxisMapping) {
        log::info!("Applying axis mapping: {:?}", mapping.assignments());
        self.inner.write().mapping = mapping;
    }

    /// Consistent view of the latest sample, applied corrections and
    /// connection health. Safe to call at any rate alongside `publish`.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let inner = self.inner.read();
        TelemetrySnapshot {
            latest: inner.latest,
            calibration: inner.calibration,
            mapping: inner.mapping,
            connection: self.monitor.state(),
            rates: self.monitor.rates(),
        }
    }

    /// Subscribe to the corrected sample stream.
    ///
    /// The channel is bounded; when a subscriber falls behind, new samples
    /// are dropped for that subscriber only. Dropping the receiver
    /// unsubscribes on the next publish.
    pub fn subscribe(&self) -> Receiver<CorrectedSample> {
        let (tx, rx) = bounded(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    fn broadcast(&self, sample: CorrectedSample) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(sample) {
            Ok(()) => true,
            // Subscriber is slow - drop this sample for it, keep the channel
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

fn correct(
    mapping: &AxisMapping,
    calibration: &CalibrationProfile,
    raw: SensorSample,
) -> CorrectedSample {
    let mut gyro = [0.0f32; 3];
    let mut accel = raw.accel.map(|_| [0.0f32; 3]);

    for (logical, value) in gyro.iter_mut().enumerate() {
        let channel = mapping.assignments()[logical];
        *value = raw.gyro[channel] as f32 - calibration.gyro_offset_for(channel);
    }
    if let (Some(out), Some(raw_accel)) = (accel.as_mut(), raw.accel.as_ref()) {
        for (logical, value) in out.iter_mut().enumerate() {
            let channel = mapping.assignments()[logical];
            *value = raw_accel[channel] as f32 - calibration.accel_offset_for(channel);
        }
    }

    CorrectedSample { raw, gyro, accel }
}
