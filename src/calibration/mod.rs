//! Operator-driven calibration procedures
//!
//! Both procedures consume the store's published sample stream as competing
//! subscribers, so ingestion never stalls while an operator works through
//! them. Each run is independent and re-runnable after a failure.

mod axis;
mod bias;

pub use axis::run_axis_mapping;
pub use bias::{run_calibration, OffsetEstimator};
