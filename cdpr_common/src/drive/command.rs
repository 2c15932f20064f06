//! Event payload carried into `OperationEnabled`.

use serde::{Deserialize, Serialize};

use super::state::OperationMode;

/// Operation mode plus target set-point for that mode.
///
/// The target is kept at 32 bits; torque targets are narrowed to the 16-bit
/// process-data width when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub mode: OperationMode,
    pub value: i32,
}

impl DriveCommand {
    #[inline]
    pub const fn new(mode: OperationMode, value: i32) -> Self {
        Self { mode, value }
    }

    #[inline]
    pub const fn position(value: i32) -> Self {
        Self::new(OperationMode::CyclicPosition, value)
    }

    #[inline]
    pub const fn velocity(value: i32) -> Self {
        Self::new(OperationMode::CyclicVelocity, value)
    }

    #[inline]
    pub const fn torque_target(value: i16) -> Self {
        Self::new(OperationMode::CyclicTorque, value as i32)
    }

    /// Target narrowed to the torque width, saturating at the `i16` bounds.
    #[inline]
    pub const fn torque(&self) -> i16 {
        if self.value > i16::MAX as i32 {
            i16::MAX
        } else if self.value < i16::MIN as i32 {
            i16::MIN
        } else {
            self.value as i16
        }
    }
}
