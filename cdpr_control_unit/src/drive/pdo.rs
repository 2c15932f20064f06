//! Per-axis process image: layout and little-endian codec.
//!
//! The fieldbus master exposes one byte-addressable domain. Each axis owns a
//! fixed set of byte offsets into it; [`PdoOffsets::packed`] lays the
//! entries out back to back, outputs first, in object-table order.

use static_assertions::const_assert_eq;
use thiserror::Error;

use cdpr_common::drive::pdo::{
    AUX_POSITION_ACTUAL, CONTROL_WORD, DIGITAL_INPUTS, DISPLAY_OPERATION_MODE, INPUT_IMAGE_SIZE,
    OPERATION_MODE, OUTPUT_IMAGE_SIZE, POSITION_ACTUAL, STATUS_WORD, TARGET_POSITION,
    TARGET_TORQUE, TARGET_VELOCITY, TORQUE_ACTUAL, VELOCITY_ACTUAL,
};
use cdpr_common::drive::{ControlWord, OperationMode, StatusWord};

/// Bytes of domain used by one axis (outputs + inputs).
pub const AXIS_IMAGE_SIZE: usize = OUTPUT_IMAGE_SIZE + INPUT_IMAGE_SIZE;

const_assert_eq!(AXIS_IMAGE_SIZE, 34);

/// Process-image access error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PdoError {
    #[error("entry at offset {offset} ({len} bytes) exceeds domain of {domain_len} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        domain_len: usize,
    },
}

// ─── Layout ─────────────────────────────────────────────────────────

/// Byte offset of every entry of one axis inside the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdoOffsets {
    pub control_word: usize,
    pub op_mode: usize,
    pub target_torque: usize,
    pub target_position: usize,
    pub target_velocity: usize,
    pub status_word: usize,
    pub display_op_mode: usize,
    pub position: usize,
    pub velocity: usize,
    pub torque: usize,
    pub digital_inputs: usize,
    pub aux_position: usize,
}

impl PdoOffsets {
    /// Contiguous layout starting at `base`.
    pub const fn packed(base: usize) -> Self {
        let control_word = base;
        let op_mode = control_word + CONTROL_WORD.bytes();
        let target_torque = op_mode + OPERATION_MODE.bytes();
        let target_position = target_torque + TARGET_TORQUE.bytes();
        let target_velocity = target_position + TARGET_POSITION.bytes();
        let status_word = target_velocity + TARGET_VELOCITY.bytes();
        let display_op_mode = status_word + STATUS_WORD.bytes();
        let position = display_op_mode + DISPLAY_OPERATION_MODE.bytes();
        let velocity = position + POSITION_ACTUAL.bytes();
        let torque = velocity + VELOCITY_ACTUAL.bytes();
        let digital_inputs = torque + TORQUE_ACTUAL.bytes();
        let aux_position = digital_inputs + DIGITAL_INPUTS.bytes();
        Self {
            control_word,
            op_mode,
            target_torque,
            target_position,
            target_velocity,
            status_word,
            display_op_mode,
            position,
            velocity,
            torque,
            digital_inputs,
            aux_position,
        }
    }

    /// Packed layout of the `index`-th axis in a domain of consecutive axes.
    #[inline]
    pub const fn for_axis(index: usize) -> Self {
        Self::packed(index * AXIS_IMAGE_SIZE)
    }

    fn spans(&self) -> [(usize, usize); 12] {
        [
            (self.control_word, CONTROL_WORD.bytes()),
            (self.op_mode, OPERATION_MODE.bytes()),
            (self.target_torque, TARGET_TORQUE.bytes()),
            (self.target_position, TARGET_POSITION.bytes()),
            (self.target_velocity, TARGET_VELOCITY.bytes()),
            (self.status_word, STATUS_WORD.bytes()),
            (self.display_op_mode, DISPLAY_OPERATION_MODE.bytes()),
            (self.position, POSITION_ACTUAL.bytes()),
            (self.velocity, VELOCITY_ACTUAL.bytes()),
            (self.torque, TORQUE_ACTUAL.bytes()),
            (self.digital_inputs, DIGITAL_INPUTS.bytes()),
            (self.aux_position, AUX_POSITION_ACTUAL.bytes()),
        ]
    }

    /// One past the last byte used.
    pub fn end(&self) -> usize {
        self.spans()
            .iter()
            .map(|&(offset, len)| offset + len)
            .max()
            .unwrap_or(0)
    }

    /// Check every entry fits in a domain of `domain_len` bytes.
    pub fn validate(&self, domain_len: usize) -> Result<(), PdoError> {
        for (offset, len) in self.spans() {
            if offset + len > domain_len {
                return Err(PdoError::OutOfBounds {
                    offset,
                    len,
                    domain_len,
                });
            }
        }
        Ok(())
    }
}

// ─── Byte Access ────────────────────────────────────────────────────

fn get<const N: usize>(domain: &[u8], offset: usize) -> Result<[u8; N], PdoError> {
    offset
        .checked_add(N)
        .and_then(|end| domain.get(offset..end))
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or(PdoError::OutOfBounds {
            offset,
            len: N,
            domain_len: domain.len(),
        })
}

fn put(domain: &mut [u8], offset: usize, bytes: &[u8]) -> Result<(), PdoError> {
    let len = bytes.len();
    let domain_len = domain.len();
    let dst = offset
        .checked_add(len)
        .and_then(|end| domain.get_mut(offset..end))
        .ok_or(PdoError::OutOfBounds {
            offset,
            len,
            domain_len,
        })?;
    dst.copy_from_slice(bytes);
    Ok(())
}

// ─── Mirrors ────────────────────────────────────────────────────────

/// Device → master process data of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputPdos {
    pub status_word: StatusWord,
    pub display_op_mode: OperationMode,
    pub position: i32,
    pub velocity: i32,
    pub torque: i16,
    pub digital_inputs: u32,
    pub aux_position: i32,
}

impl InputPdos {
    pub fn read(domain: &[u8], offsets: &PdoOffsets) -> Result<Self, PdoError> {
        Ok(Self {
            status_word: StatusWord::from_raw(u16::from_le_bytes(get(domain, offsets.status_word)?)),
            display_op_mode: OperationMode::from_raw(i8::from_le_bytes(get(
                domain,
                offsets.display_op_mode,
            )?)),
            position: i32::from_le_bytes(get(domain, offsets.position)?),
            velocity: i32::from_le_bytes(get(domain, offsets.velocity)?),
            torque: i16::from_le_bytes(get(domain, offsets.torque)?),
            digital_inputs: u32::from_le_bytes(get(domain, offsets.digital_inputs)?),
            aux_position: i32::from_le_bytes(get(domain, offsets.aux_position)?),
        })
    }

    /// Device side of the exchange.
    pub fn write(&self, domain: &mut [u8], offsets: &PdoOffsets) -> Result<(), PdoError> {
        put(domain, offsets.status_word, &self.status_word.raw().to_le_bytes())?;
        put(domain, offsets.display_op_mode, &self.display_op_mode.raw().to_le_bytes())?;
        put(domain, offsets.position, &self.position.to_le_bytes())?;
        put(domain, offsets.velocity, &self.velocity.to_le_bytes())?;
        put(domain, offsets.torque, &self.torque.to_le_bytes())?;
        put(domain, offsets.digital_inputs, &self.digital_inputs.to_le_bytes())?;
        put(domain, offsets.aux_position, &self.aux_position.to_le_bytes())
    }
}

/// Master → device process data of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputPdos {
    pub control_word: ControlWord,
    pub op_mode: OperationMode,
    pub target_torque: i16,
    pub target_position: i32,
    pub target_velocity: i32,
}

impl OutputPdos {
    /// Serialize control word and mode; targets only when `with_targets`.
    pub fn write(
        &self,
        domain: &mut [u8],
        offsets: &PdoOffsets,
        with_targets: bool,
    ) -> Result<(), PdoError> {
        put(domain, offsets.control_word, &self.control_word.raw().to_le_bytes())?;
        put(domain, offsets.op_mode, &self.op_mode.raw().to_le_bytes())?;
        if with_targets {
            put(domain, offsets.target_position, &self.target_position.to_le_bytes())?;
            put(domain, offsets.target_velocity, &self.target_velocity.to_le_bytes())?;
            put(domain, offsets.target_torque, &self.target_torque.to_le_bytes())?;
        }
        Ok(())
    }

    /// Device side of the exchange.
    pub fn read(domain: &[u8], offsets: &PdoOffsets) -> Result<Self, PdoError> {
        Ok(Self {
            control_word: ControlWord::from_raw(u16::from_le_bytes(get(
                domain,
                offsets.control_word,
            )?)),
            op_mode: OperationMode::from_raw(i8::from_le_bytes(get(domain, offsets.op_mode)?)),
            target_torque: i16::from_le_bytes(get(domain, offsets.target_torque)?),
            target_position: i32::from_le_bytes(get(domain, offsets.target_position)?),
            target_velocity: i32::from_le_bytes(get(domain, offsets.target_velocity)?),
        })
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
