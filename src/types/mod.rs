//! Core telemetry data types

mod calibration;
mod connection;
mod mapping;
mod sample;

pub use calibration::CalibrationProfile;
pub use connection::{ConnectionState, RateMetrics};
pub use mapping::{AxisMapping, LogicalAxis};
pub use sample::{CorrectedSample, SensorSample};
