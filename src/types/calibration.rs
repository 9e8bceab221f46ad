//! Calibration profile type

/// Per-channel zero offsets produced by one calibration run.
///
/// Immutable after creation; a later successful run supersedes it rather
/// than mutating it. `valid` is false until a run meets the variance bound,
/// and an invalid profile is never applied - the store rejects it and keeps
/// zero offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProfile {
    /// Mean stationary gyro reading per raw channel
    pub gyro_offset: [f32; 3],
    /// Mean stationary accel reading per raw channel, when requested
    pub accel_offset: Option<[f32; 3]>,
    /// Observed gyro variance per raw channel (diagnostics on failure)
    pub gyro_variance: [f32; 3],
    /// Observed accel variance per raw channel, when requested
    pub accel_variance: Option<[f32; 3]>,
    /// Whether every channel's variance stayed below the configured bound
    pub valid: bool,
}

impl CalibrationProfile {
    /// Profile in effect before any run completes: zero offsets, not valid.
    pub fn unapplied() -> Self {
        Self {
            gyro_offset: [0.0; 3],
            accel_offset: None,
            gyro_variance: [0.0; 3],
            accel_variance: None,
            valid: false,
        }
    }

    /// Gyro offset for one raw channel, zero when nothing has been applied
    pub fn gyro_offset_for(&self, channel: usize) -> f32 {
        self.gyro_offset[channel]
    }

    /// Accel offset for one raw channel, zero when accel was not calibrated
    pub fn accel_offset_for(&self, channel: usize) -> f32 {
        self.accel_offset.map_or(0.0, |offsets| offsets[channel])
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::unapplied()
    }
}
