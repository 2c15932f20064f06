//! Control word (0x6040) and status word (0x6041) bitfields.
//!
//! Only the bits the control core reads or writes are named. Unknown bits
//! coming from the device are preserved (`from_bits_retain`) so that a raw
//! word survives a decode/encode cycle unchanged.

use bitflags::bitflags;

use super::state::DriveState;

bitflags! {
    /// Device status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusWord: u16 {
        const READY_TO_SWITCH_ON = 1 << 0;
        const SWITCHED_ON        = 1 << 1;
        const OPERATION_ENABLED  = 1 << 2;
        const FAULT              = 1 << 3;
        /// Set while quick stop is *not* active.
        const QUICK_STOP         = 1 << 5;
        const SWITCH_ON_DISABLED = 1 << 6;
    }
}

impl StatusWord {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u16 {
        self.bits()
    }

    #[inline]
    pub const fn is_ready_to_switch_on(&self) -> bool {
        self.contains(Self::READY_TO_SWITCH_ON)
    }

    #[inline]
    pub const fn is_switched_on(&self) -> bool {
        self.contains(Self::SWITCHED_ON)
    }

    #[inline]
    pub const fn is_operation_enabled(&self) -> bool {
        self.contains(Self::OPERATION_ENABLED)
    }

    #[inline]
    pub const fn is_fault(&self) -> bool {
        self.contains(Self::FAULT)
    }

    #[inline]
    pub const fn is_quick_stop(&self) -> bool {
        self.contains(Self::QUICK_STOP)
    }

    #[inline]
    pub const fn is_switch_on_disabled(&self) -> bool {
        self.contains(Self::SWITCH_ON_DISABLED)
    }

    /// Decode the device state from the status word.
    ///
    /// The checks run in a fixed priority order that matches the vendor's
    /// bit semantics; reordering them changes the result for words with
    /// several bits set.
    pub const fn decode_state(&self) -> DriveState {
        if self.is_switch_on_disabled() {
            return DriveState::NotReadyToSwitchOn;
        }
        if self.is_quick_stop() {
            if !self.is_switched_on() {
                return DriveState::ReadyToSwitchOn;
            }
            if !self.is_operation_enabled() {
                return DriveState::SwitchedOn;
            }
            return DriveState::OperationEnabled;
        }
        if !self.is_fault() {
            return DriveState::QuickStopActive;
        }
        if self.is_operation_enabled() {
            return DriveState::FaultReactionActive;
        }
        DriveState::Fault
    }
}

bitflags! {
    /// Device control word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlWord: u16 {
        const SWITCH_ON        = 1 << 0;
        const ENABLE_VOLTAGE   = 1 << 1;
        /// Active low: cleared to request a quick stop.
        const QUICK_STOP       = 1 << 2;
        const ENABLE_OPERATION = 1 << 3;
        const FAULT_RESET      = 1 << 7;
    }
}

impl ControlWord {
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u16 {
        self.bits()
    }

    #[inline]
    pub const fn switch_on(&self) -> bool {
        self.contains(Self::SWITCH_ON)
    }

    #[inline]
    pub const fn enable_voltage(&self) -> bool {
        self.contains(Self::ENABLE_VOLTAGE)
    }

    #[inline]
    pub const fn quick_stop(&self) -> bool {
        self.contains(Self::QUICK_STOP)
    }

    #[inline]
    pub const fn enable_operation(&self) -> bool {
        self.contains(Self::ENABLE_OPERATION)
    }

    #[inline]
    pub const fn fault_reset(&self) -> bool {
        self.contains(Self::FAULT_RESET)
    }

    /// `Shutdown` command pattern.
    pub fn apply_shutdown(&mut self) {
        self.remove(Self::SWITCH_ON | Self::FAULT_RESET);
        self.insert(Self::ENABLE_VOLTAGE | Self::QUICK_STOP);
    }

    /// `SwitchOn` command pattern.
    pub fn apply_switch_on(&mut self) {
        self.insert(Self::SWITCH_ON | Self::ENABLE_VOLTAGE | Self::QUICK_STOP);
        self.remove(Self::ENABLE_OPERATION | Self::FAULT_RESET);
    }

    /// `EnableOperation` command pattern.
    pub fn apply_enable_operation(&mut self) {
        self.insert(
            Self::SWITCH_ON | Self::ENABLE_VOLTAGE | Self::QUICK_STOP | Self::ENABLE_OPERATION,
        );
        self.remove(Self::FAULT_RESET);
    }

    /// `DisableOperation` command pattern (same bits as `SwitchOn`).
    pub fn apply_disable_operation(&mut self) {
        self.apply_switch_on();
    }

    /// `DisableVoltage` command pattern.
    pub fn apply_disable_voltage(&mut self) {
        self.remove(Self::ENABLE_VOLTAGE | Self::FAULT_RESET);
    }

    /// `QuickStop` command pattern.
    pub fn apply_quick_stop(&mut self) {
        self.insert(Self::ENABLE_VOLTAGE);
        self.remove(Self::QUICK_STOP | Self::FAULT_RESET);
    }

    /// `FaultReset` command pattern.
    pub fn apply_fault_reset(&mut self) {
        self.insert(Self::FAULT_RESET);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
