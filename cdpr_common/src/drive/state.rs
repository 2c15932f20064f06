//! Drive protocol states and operation modes.
//!
//! States mirror the device-side power state machine of the servo
//! amplifiers. `Start` and `NotReadyToSwitchOn` model the device power-up and
//! are never stable: entering either one advances to the next state at once.

use serde::{Deserialize, Serialize};

// ─── Drive State ────────────────────────────────────────────────────

/// Per-axis drive state as reported by the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriveState {
    /// Software-side initial state, before the device was ever observed.
    Start = 0,
    /// Device initializing (transient).
    NotReadyToSwitchOn = 1,
    /// Power stage disabled, drive waiting for `Shutdown`.
    SwitchOnDisabled = 2,
    /// Voltage enabled, power stage off.
    ReadyToSwitchOn = 3,
    /// Power stage on, motor not controlled.
    SwitchedOn = 4,
    /// Motor under closed-loop control.
    OperationEnabled = 5,
    /// Quick-stop ramp active.
    QuickStopActive = 6,
    /// Fault detected, fault reaction running.
    FaultReactionActive = 7,
    /// Fault latched, waiting for `FaultReset`.
    Fault = 8,
}

impl DriveState {
    /// All states, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Start,
        Self::NotReadyToSwitchOn,
        Self::SwitchOnDisabled,
        Self::ReadyToSwitchOn,
        Self::SwitchedOn,
        Self::OperationEnabled,
        Self::QuickStopActive,
        Self::FaultReactionActive,
        Self::Fault,
    ];

    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::NotReadyToSwitchOn),
            2 => Some(Self::SwitchOnDisabled),
            3 => Some(Self::ReadyToSwitchOn),
            4 => Some(Self::SwitchedOn),
            5 => Some(Self::OperationEnabled),
            6 => Some(Self::QuickStopActive),
            7 => Some(Self::FaultReactionActive),
            8 => Some(Self::Fault),
            _ => None,
        }
    }

    /// Upper-case diagnostic name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::NotReadyToSwitchOn => "NOT_READY_TO_SWITCH_ON",
            Self::SwitchOnDisabled => "SWITCH_ON_DISABLED",
            Self::ReadyToSwitchOn => "READY_TO_SWITCH_ON",
            Self::SwitchedOn => "SWITCHED_ON",
            Self::OperationEnabled => "OPERATION_ENABLED",
            Self::QuickStopActive => "QUICK_STOP_ACTIVE",
            Self::FaultReactionActive => "FAULT_REACTION_ACTIVE",
            Self::Fault => "FAULT",
        }
    }

    /// True for the power-up states that advance on their own.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Start | Self::NotReadyToSwitchOn)
    }

    /// State entered automatically after this one, if transient.
    #[inline]
    pub const fn auto_successor(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::NotReadyToSwitchOn),
            Self::NotReadyToSwitchOn => Some(Self::SwitchOnDisabled),
            _ => None,
        }
    }

    /// First stable state reached from here.
    #[inline]
    pub const fn settled(&self) -> Self {
        match self {
            Self::Start | Self::NotReadyToSwitchOn => Self::SwitchOnDisabled,
            other => *other,
        }
    }

    /// Whether target set-points are meaningful to the device in this state.
    #[inline]
    pub const fn accepts_setpoints(&self) -> bool {
        matches!(self, Self::SwitchedOn | Self::OperationEnabled)
    }

    /// True for the two fault states.
    #[inline]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault | Self::FaultReactionActive)
    }
}

impl Default for DriveState {
    fn default() -> Self {
        Self::Start
    }
}

impl std::fmt::Display for DriveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Operation Mode ─────────────────────────────────────────────────

/// Drive operation mode (object 0x6060 / 0x6061).
///
/// Only the cyclic synchronous modes are used by the control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum OperationMode {
    /// No operation mode selected.
    None = -1,
    /// Cyclic synchronous position.
    CyclicPosition = 8,
    /// Cyclic synchronous velocity.
    CyclicVelocity = 9,
    /// Cyclic synchronous torque.
    CyclicTorque = 10,
}

impl OperationMode {
    /// Decode a raw mode byte. Modes other than the cyclic ones (profile,
    /// homing, vendor-specific) map to `None`; the drive state machine does
    /// not write such a mode back to the device.
    #[inline]
    pub const fn from_raw(raw: i8) -> Self {
        match raw {
            8 => Self::CyclicPosition,
            9 => Self::CyclicVelocity,
            10 => Self::CyclicTorque,
            _ => Self::None,
        }
    }

    #[inline]
    pub const fn raw(self) -> i8 {
        self as i8
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NO_MODE",
            Self::CyclicPosition => "CYCLIC_POSITION",
            Self::CyclicVelocity => "CYCLIC_VELOCITY",
            Self::CyclicTorque => "CYCLIC_TORQUE",
        }
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        Self::None
    }
}

impl std::fmt::Display for OperationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_state_u8_roundtrip() {
        for state in DriveState::ALL {
            assert_eq!(DriveState::from_u8(state as u8), Some(state));
        }
        assert_eq!(DriveState::from_u8(9), None);
    }

    #[test]
    fn transient_states_settle_on_switch_on_disabled() {
        assert_eq!(DriveState::Start.settled(), DriveState::SwitchOnDisabled);
        assert_eq!(
            DriveState::NotReadyToSwitchOn.settled(),
            DriveState::SwitchOnDisabled
        );
        assert_eq!(
            DriveState::Start.auto_successor(),
            Some(DriveState::NotReadyToSwitchOn)
        );
        for state in DriveState::ALL.into_iter().skip(2) {
            assert!(!state.is_transient());
            assert_eq!(state.settled(), state);
            assert_eq!(state.auto_successor(), None);
        }
    }

    #[test]
    fn setpoints_only_when_powered() {
        let powered: Vec<_> = DriveState::ALL
            .into_iter()
            .filter(DriveState::accepts_setpoints)
            .collect();
        assert_eq!(
            powered,
            vec![DriveState::SwitchedOn, DriveState::OperationEnabled]
        );
    }

    #[test]
    fn operation_mode_raw_values() {
        assert_eq!(OperationMode::CyclicPosition.raw(), 8);
        assert_eq!(OperationMode::CyclicVelocity.raw(), 9);
        assert_eq!(OperationMode::CyclicTorque.raw(), 10);
        assert_eq!(OperationMode::None.raw(), -1);
        assert_eq!(OperationMode::from_raw(9), OperationMode::CyclicVelocity);
        assert_eq!(OperationMode::from_raw(1), OperationMode::None);
        assert_eq!(OperationMode::default(), OperationMode::None);
    }

    #[test]
    fn state_names() {
        assert_eq!(DriveState::OperationEnabled.to_string(), "OPERATION_ENABLED");
        assert_eq!(OperationMode::CyclicTorque.to_string(), "CYCLIC_TORQUE");
    }
}
