//! Stationary offset estimation
//!
//! Collects a bounded run of samples while the device sits still, low-pass
//! filters each channel to keep single-sample spikes out of the statistics,
//! and accepts the run only when every channel's variance stays below the
//! configured bound. A rejected run reports the observed variance so the
//! operator can tell noise from movement.

use crate::config::CalibrationConfig;
use crate::error::{Error, Result};
use crate::link::ConnectionMonitor;
use crate::types::{CalibrationProfile, CorrectedSample, SensorSample};
use crossbeam_channel::{Receiver, RecvTimeoutError};

#[derive(Debug, Clone, Copy, Default)]
struct ChannelAccumulator {
    sum: f64,
    sum_sq: f64,
}

impl ChannelAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn mean(&self, count: usize) -> f64 {
        self.sum / count as f64
    }

    fn variance(&self, count: usize) -> f64 {
        let mean = self.mean(count);
        ((self.sum_sq / count as f64) - mean * mean).max(0.0)
    }
}

/// Accumulates low-pass filtered per-channel statistics over one run.
pub struct OffsetEstimator {
    alpha: f32,
    track_accel: bool,
    count: usize,
    gyro_filtered: Option<[f32; 3]>,
    gyro: [ChannelAccumulator; 3],
    accel_count: usize,
    accel_filtered: Option<[f32; 3]>,
    accel: [ChannelAccumulator; 3],
}

impl OffsetEstimator {
    /// Create an estimator with low-pass coefficient `alpha`
    pub fn new(alpha: f32, track_accel: bool) -> Self {
        Self {
            alpha,
            track_accel,
            count: 0,
            gyro_filtered: None,
            gyro: [ChannelAccumulator::default(); 3],
            accel_count: 0,
            accel_filtered: None,
            accel: [ChannelAccumulator::default(); 3],
        }
    }

    /// Add one raw sample to the run
    pub fn add_sample(&mut self, sample: &SensorSample) {
        let filtered = low_pass(self.alpha, self.gyro_filtered, sample.gyro);
        for (acc, value) in self.gyro.iter_mut().zip(filtered.iter()) {
            acc.add(*value as f64);
        }
        self.gyro_filtered = Some(filtered);
        self.count += 1;

        if self.track_accel {
            if let Some(raw_accel) = sample.accel {
                let filtered = low_pass(self.alpha, self.accel_filtered, raw_accel);
                for (acc, value) in self.accel.iter_mut().zip(filtered.iter()) {
                    acc.add(*value as f64);
                }
                self.accel_filtered = Some(filtered);
                self.accel_count += 1;
            }
        }
    }

    /// Number of samples accumulated
    pub fn count(&self) -> usize {
        self.count
    }

    /// Close the run and judge it against `variance_threshold`.
    pub fn finish(self, variance_threshold: f32) -> CalibrationProfile {
        if self.count < 2 {
            return CalibrationProfile::unapplied();
        }

        let gyro_offset = per_channel(&self.gyro, self.count, ChannelAccumulator::mean);
        let gyro_variance = per_channel(&self.gyro, self.count, ChannelAccumulator::variance);

        let (accel_offset, accel_variance) = if self.track_accel && self.accel_count >= 2 {
            (
                Some(per_channel(&self.accel, self.accel_count, ChannelAccumulator::mean)),
                Some(per_channel(
                    &self.accel,
                    self.accel_count,
                    ChannelAccumulator::variance,
                )),
            )
        } else {
            (None, None)
        };

        let mut valid = gyro_variance.iter().all(|&v| v < variance_threshold);
        if let Some(av) = accel_variance {
            valid = valid && av.iter().all(|&v| v < variance_threshold);
        }

        CalibrationProfile {
            gyro_offset,
            accel_offset,
            gyro_variance,
            accel_variance,
            valid,
        }
    }
}

fn low_pass(alpha: f32, previous: Option<[f32; 3]>, raw: [i32; 3]) -> [f32; 3] {
    match previous {
        Some(prev) => {
            let mut out = [0.0f32; 3];
            for i in 0..3 {
                out[i] = alpha * prev[i] + (1.0 - alpha) * raw[i] as f32;
            }
            out
        }
        None => [raw[0] as f32, raw[1] as f32, raw[2] as f32],
    }
}

fn per_channel(
    accumulators: &[ChannelAccumulator; 3],
    count: usize,
    f: impl Fn(&ChannelAccumulator, usize) -> f64,
) -> [f32; 3] {
    [
        f(&accumulators[0], count) as f32,
        f(&accumulators[1], count) as f32,
        f(&accumulators[2], count) as f32,
    ]
}

/// Run one calibration pass over the live sample stream.
///
/// Fails fast with `Error::NotConnected` unless the link is connected, and
/// with `Error::InsufficientSamples` if the stream dries up before the
/// target count arrives. The returned profile is *not* installed anywhere;
/// the caller decides what to do with an invalid run.
pub fn run_calibration(
    source: &Receiver<CorrectedSample>,
    monitor: &ConnectionMonitor,
    config: &CalibrationConfig,
) -> Result<CalibrationProfile> {
    if !monitor.is_connected() {
        return Err(Error::NotConnected);
    }

    log::info!(
        "Calibration run: collecting {} samples (alpha {}, variance threshold {})",
        config.sample_count,
        config.low_pass_alpha,
        config.variance_threshold
    );

    let mut estimator = OffsetEstimator::new(config.low_pass_alpha, config.calibrate_accel);
    while estimator.count() < config.sample_count {
        match source.recv_timeout(config.sample_timeout()) {
            Ok(sample) => estimator.add_sample(&sample.raw),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return Err(Error::InsufficientSamples {
                    got: estimator.count(),
                    wanted: config.sample_count,
                });
            }
        }
    }

    let profile = estimator.finish(config.variance_threshold);
    if profile.valid {
        log::info!(
            "Calibration accepted: gyro offsets {:?} (variance {:?})",
            profile.gyro_offset,
            profile.gyro_variance
        );
    } else {
        log::warn!(
            "Calibration rejected: gyro variance {:?} exceeds threshold {} - was the device moving?",
            profile.gyro_variance,
            config.variance_threshold
        );
    }
    Ok(profile)
}
