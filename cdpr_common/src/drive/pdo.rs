//! Process-data object table of the servo amplifier.
//!
//! Object indices and bit widths are fixed by the vendor device profile.
//! The control unit uses this table to size and lay out each axis' slice of
//! the fieldbus domain.

use static_assertions::const_assert_eq;

/// Vendor id of the supported amplifier.
pub const VENDOR_ID: u32 = 0x0000_009a;
/// Product code of the supported amplifier.
pub const PRODUCT_CODE: u32 = 0x0003_0924;

/// Direction of a process-data entry, seen from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoDirection {
    /// Master → device (RxPDO).
    Output,
    /// Device → master (TxPDO).
    Input,
}

/// One mapped object dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoEntry {
    pub name: &'static str,
    pub index: u16,
    pub subindex: u8,
    pub bits: u8,
    pub direction: PdoDirection,
}

impl PdoEntry {
    const fn output(name: &'static str, index: u16, bits: u8) -> Self {
        Self {
            name,
            index,
            subindex: 0x00,
            bits,
            direction: PdoDirection::Output,
        }
    }

    const fn input(name: &'static str, index: u16, bits: u8) -> Self {
        Self {
            name,
            index,
            subindex: 0x00,
            bits,
            direction: PdoDirection::Input,
        }
    }

    #[inline]
    pub const fn bytes(&self) -> usize {
        (self.bits / 8) as usize
    }
}

pub const CONTROL_WORD: PdoEntry = PdoEntry::output("control_word", 0x6040, 16);
pub const OPERATION_MODE: PdoEntry = PdoEntry::output("operation_mode", 0x6060, 8);
pub const TARGET_TORQUE: PdoEntry = PdoEntry::output("target_torque", 0x6071, 16);
pub const TARGET_POSITION: PdoEntry = PdoEntry::output("target_position", 0x607a, 32);
pub const TARGET_VELOCITY: PdoEntry = PdoEntry::output("target_velocity", 0x60ff, 32);

pub const STATUS_WORD: PdoEntry = PdoEntry::input("status_word", 0x6041, 16);
pub const DISPLAY_OPERATION_MODE: PdoEntry =
    PdoEntry::input("display_operation_mode", 0x6061, 8);
pub const POSITION_ACTUAL: PdoEntry = PdoEntry::input("position_actual", 0x6064, 32);
pub const VELOCITY_ACTUAL: PdoEntry = PdoEntry::input("velocity_actual", 0x606c, 32);
pub const TORQUE_ACTUAL: PdoEntry = PdoEntry::input("torque_actual", 0x6077, 16);
pub const DIGITAL_INPUTS: PdoEntry = PdoEntry::input("digital_inputs", 0x60fd, 32);
pub const AUX_POSITION_ACTUAL: PdoEntry = PdoEntry::input("aux_position_actual", 0x20a0, 32);

/// Output entries in domain order.
pub const OUTPUT_ENTRIES: [PdoEntry; 5] = [
    CONTROL_WORD,
    OPERATION_MODE,
    TARGET_TORQUE,
    TARGET_POSITION,
    TARGET_VELOCITY,
];

/// Input entries in domain order.
pub const INPUT_ENTRIES: [PdoEntry; 7] = [
    STATUS_WORD,
    DISPLAY_OPERATION_MODE,
    POSITION_ACTUAL,
    VELOCITY_ACTUAL,
    TORQUE_ACTUAL,
    DIGITAL_INPUTS,
    AUX_POSITION_ACTUAL,
];

const fn total_bytes(entries: &[PdoEntry]) -> usize {
    let mut sum = 0;
    let mut i = 0;
    while i < entries.len() {
        sum += entries[i].bytes();
        i += 1;
    }
    sum
}

/// Bytes of output process data per axis.
pub const OUTPUT_IMAGE_SIZE: usize = total_bytes(&OUTPUT_ENTRIES);
/// Bytes of input process data per axis.
pub const INPUT_IMAGE_SIZE: usize = total_bytes(&INPUT_ENTRIES);

const_assert_eq!(OUTPUT_IMAGE_SIZE, 13);
const_assert_eq!(INPUT_IMAGE_SIZE, 21);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_device_profile() {
        assert_eq!(CONTROL_WORD.bits, 16);
        assert_eq!(OPERATION_MODE.bits, 8);
        assert_eq!(TARGET_TORQUE.bits, 16);
        assert_eq!(TARGET_POSITION.bits, 32);
        assert_eq!(TARGET_VELOCITY.bits, 32);
        assert_eq!(STATUS_WORD.bits, 16);
        assert_eq!(DISPLAY_OPERATION_MODE.bits, 8);
        assert_eq!(POSITION_ACTUAL.bits, 32);
        assert_eq!(VELOCITY_ACTUAL.bits, 32);
        assert_eq!(TORQUE_ACTUAL.bits, 16);
        assert_eq!(DIGITAL_INPUTS.bits, 32);
        assert_eq!(AUX_POSITION_ACTUAL.bits, 32);
    }

    #[test]
    fn entries_are_grouped_by_direction() {
        assert!(OUTPUT_ENTRIES.iter().all(|e| e.direction == PdoDirection::Output));
        assert!(INPUT_ENTRIES.iter().all(|e| e.direction == PdoDirection::Input));
    }
}
