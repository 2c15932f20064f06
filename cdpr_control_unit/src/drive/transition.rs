//! Drive events and the (state, event) transition table.

use std::fmt;

use cdpr_common::drive::{DriveState, OperationMode};

/// External request issued to a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveEvent {
    Shutdown,
    SwitchOn,
    EnableOperation,
    DisableOperation,
    DisableVoltage,
    QuickStop,
    FaultReset,
    ChangePosition(i32),
    ChangeDeltaPosition(i32),
    ChangeVelocity(i32),
    ChangeDeltaVelocity(i32),
    ChangeTorque(i16),
    ChangeDeltaTorque(i16),
    ChangeOpMode(OperationMode),
    /// Keep the reported mode, hold the current actual value.
    SetTargetDefaults,
}

impl DriveEvent {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "Shutdown",
            Self::SwitchOn => "SwitchOn",
            Self::EnableOperation => "EnableOperation",
            Self::DisableOperation => "DisableOperation",
            Self::DisableVoltage => "DisableVoltage",
            Self::QuickStop => "QuickStop",
            Self::FaultReset => "FaultReset",
            Self::ChangePosition(_) => "ChangePosition",
            Self::ChangeDeltaPosition(_) => "ChangeDeltaPosition",
            Self::ChangeVelocity(_) => "ChangeVelocity",
            Self::ChangeDeltaVelocity(_) => "ChangeDeltaVelocity",
            Self::ChangeTorque(_) => "ChangeTorque",
            Self::ChangeDeltaTorque(_) => "ChangeDeltaTorque",
            Self::ChangeOpMode(_) => "ChangeOpMode",
            Self::SetTargetDefaults => "SetTargetDefaults",
        }
    }

    /// Set-point events, only meaningful while operation is enabled.
    pub const fn is_change(&self) -> bool {
        matches!(
            self,
            Self::ChangePosition(_)
                | Self::ChangeDeltaPosition(_)
                | Self::ChangeVelocity(_)
                | Self::ChangeDeltaVelocity(_)
                | Self::ChangeTorque(_)
                | Self::ChangeDeltaTorque(_)
                | Self::ChangeOpMode(_)
                | Self::SetTargetDefaults
        )
    }
}

impl fmt::Display for DriveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Event accepted, drive requested to enter the state.
    Goto(DriveState),
    /// Event not defined in the current state; nothing changes.
    Ignored,
    /// The device has no legal reaction in the current state.
    CannotHappen,
}

impl Transition {
    #[inline]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Goto(_))
    }
}

/// Transition table.
///
/// `reported` is the state decoded from the live status word. Only
/// `QuickStop` reads it: the drive ramps down through `QuickStopActive` when
/// the power stage is actually running, otherwise it drops voltage directly.
pub fn transition(state: DriveState, event: DriveEvent, reported: DriveState) -> Transition {
    use DriveEvent::*;
    use DriveState::*;

    let next = match (state, event) {
        // Power-up states are driven by the device alone.
        (Start | NotReadyToSwitchOn, _) => return Transition::CannotHappen,

        (SwitchOnDisabled | SwitchedOn | OperationEnabled, Shutdown) => ReadyToSwitchOn,

        (ReadyToSwitchOn, SwitchOn) => SwitchedOn,

        (SwitchedOn | QuickStopActive, EnableOperation) => OperationEnabled,

        (OperationEnabled, DisableOperation) => SwitchedOn,

        (ReadyToSwitchOn | SwitchedOn | OperationEnabled | QuickStopActive, DisableVoltage) => {
            SwitchOnDisabled
        }

        (ReadyToSwitchOn | SwitchedOn | OperationEnabled, QuickStop) => {
            if reported == OperationEnabled {
                QuickStopActive
            } else {
                SwitchOnDisabled
            }
        }

        (Fault, FaultReset) => SwitchOnDisabled,

        // Re-enter with a new set-point.
        (OperationEnabled, e) if e.is_change() => OperationEnabled,

        _ => return Transition::Ignored,
    };
    Transition::Goto(next)
}

// ─── Tests ──────────────────────────────────────────────────────────
