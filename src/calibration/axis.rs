//! Guided axis remapping
//!
//! The physical sensor may be mounted in any orientation, so the raw
//! channel order rarely matches the operator's roll/pitch/yaw. The remap
//! walks the three logical axes; for each one the operator excites that
//! single physical axis, and the dominant raw channel of one sample claims
//! the assignment.

use crate::error::Result;
use crate::types::{AxisMapping, LogicalAxis, SensorSample};

/// Run the guided remap.
///
/// `prompt` is the caller-supplied synchronous step: it presents the axis
/// to the operator and blocks until they signal ready (the interactive
/// layer lives outside this crate). `source` then supplies one raw sample
/// for that step.
///
/// A result where two axes claim the same channel is returned as
/// `Error::NotBijective` - nothing is installed here, so the caller simply
/// keeps the previous mapping.
pub fn run_axis_mapping<P, S>(mut prompt: P, mut source: S) -> Result<AxisMapping>
where
    P: FnMut(LogicalAxis) -> Result<()>,
    S: FnMut() -> Result<SensorSample>,
{
    let mut assignments = [0usize; 3];

    for axis in LogicalAxis::ALL {
        prompt(axis)?;
        let sample = source()?;
        let channel = dominant_channel(&sample.gyro);
        log::info!(
            "Axis {}: raw channels {:?} -> channel {}",
            axis,
            sample.gyro,
            channel
        );
        assignments[axis.index()] = channel;
    }

    let mapping = AxisMapping::from_assignments(assignments)?;
    log::info!("Axis mapping complete: {:?}", mapping.assignments());
    Ok(mapping)
}

/// Channel with the largest magnitude; ties go to the lowest index so the
/// result is deterministic.
fn dominant_channel(raw: &[i32; 3]) -> usize {
    let mut best = 0;
    for i in 1..3 {
        if raw[i].unsigned_abs() > raw[best].unsigned_abs() {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn pulse_source(pulses: Vec<[i32; 3]>) -> impl FnMut() -> Result<SensorSample> {
        let mut iter = pulses.into_iter();
        move || {
            let gyro = iter.next().expect("source exhausted");
            Ok(SensorSample::gyro_only(gyro, 0))
        }
    }

    #[test]
    fn test_pulses_produce_intended_permutation() {
        // Roll excites channel 2, pitch channel 0, yaw channel 1
        let source = pulse_source(vec![[5, -3, 900], [-800, 10, 2], [1, 750, -4]]);
        let mapping = run_axis_mapping(|_| Ok(()), source).unwrap();
        assert_eq!(mapping.assignments(), [2, 0, 1]);
    }

    #[test]
    fn test_negative_excitation_counts_by_magnitude() {
        let source = pulse_source(vec![[-900, 3, 5], [2, -850, 1], [0, 4, -700]]);
        let mapping = run_axis_mapping(|_| Ok(()), source).unwrap();
        assert!(mapping.is_identity());
    }

    #[test]
    fn test_tie_breaks_to_lowest_channel() {
        assert_eq!(dominant_channel(&[100, 100, 50]), 0);
        assert_eq!(dominant_channel(&[50, 100, 100]), 1);
        assert_eq!(dominant_channel(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_duplicate_dominant_channel_is_rejected() {
        // Two steps excite channel 0 - the operator shook the wrong axis
        let source = pulse_source(vec![[900, 1, 2], [850, 3, 4], [5, 6, 700]]);
        let err = run_axis_mapping(|_| Ok(()), source).unwrap_err();
        match err {
            Error::NotBijective { assignments } => assert_eq!(assignments, [0, 0, 2]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_prompt_sees_axes_in_order() {
        let mut prompted = Vec::new();
        let source = pulse_source(vec![[9, 0, 0], [0, 9, 0], [0, 0, 9]]);
        run_axis_mapping(
            |axis| {
                prompted.push(axis);
                Ok(())
            },
            source,
        )
        .unwrap();
        assert_eq!(prompted, LogicalAxis::ALL.to_vec());
    }

    #[test]
    fn test_prompt_failure_aborts_run() {
        let source = pulse_source(vec![[9, 0, 0]]);
        let err = run_axis_mapping(|_| Err(Error::NotConnected), source).unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }
}
