//! Logical axis remapping

use crate::error::{Error, Result};

/// Operator-meaningful axis, in the order the guided remap walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalAxis {
    /// Rotation about X
    Roll,
    /// Rotation about Y
    Pitch,
    /// Rotation about Z
    Yaw,
}

impl LogicalAxis {
    /// All logical axes in remap order
    pub const ALL: [LogicalAxis; 3] = [LogicalAxis::Roll, LogicalAxis::Pitch, LogicalAxis::Yaw];

    /// Index of this axis in a logical-order triple
    pub fn index(self) -> usize {
        match self {
            LogicalAxis::Roll => 0,
            LogicalAxis::Pitch => 1,
            LogicalAxis::Yaw => 2,
        }
    }
}

impl std::fmt::Display for LogicalAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalAxis::Roll => write!(f, "roll (X)"),
            LogicalAxis::Pitch => write!(f, "pitch (Y)"),
            LogicalAxis::Yaw => write!(f, "yaw (Z)"),
        }
    }
}

/// Permutation from logical axis to raw sensor channel index.
///
/// Always a bijection onto {0,1,2}; the constructor rejects anything else,
/// so a stored mapping can be applied without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMapping {
    map: [usize; 3],
}

impl AxisMapping {
    /// Identity mapping: each logical axis reads its same-numbered channel
    pub fn identity() -> Self {
        Self { map: [0, 1, 2] }
    }

    /// Build a mapping from per-axis channel assignments.
    ///
    /// `assignments[i]` is the raw channel feeding logical axis `i`. Returns
    /// `Error::NotBijective` when two axes claim the same channel.
    pub fn from_assignments(assignments: [usize; 3]) -> Result<Self> {
        let mut seen = [false; 3];
        for &ch in &assignments {
            if ch > 2 || seen[ch] {
                return Err(Error::NotBijective { assignments });
            }
            seen[ch] = true;
        }
        Ok(Self { map: assignments })
    }

    /// Raw channel index feeding the given logical axis
    pub fn channel(&self, axis: LogicalAxis) -> usize {
        self.map[axis.index()]
    }

    /// The raw channel assigned to each logical axis, in logical order
    pub fn assignments(&self) -> [usize; 3] {
        self.map
    }

    /// Reorder a raw channel triple into logical axis order
    pub fn apply(&self, raw: &[i32; 3]) -> [i32; 3] {
        [raw[self.map[0]], raw[self.map[1]], raw[self.map[2]]]
    }

    /// True when this is the identity permutation
    pub fn is_identity(&self) -> bool {
        self.map == [0, 1, 2]
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self::identity()
    }
}
