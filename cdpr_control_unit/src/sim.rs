//! Simulated fieldbus with software servo amplifiers.
//!
//! Each [`SimulatedDevice`] runs the device side of the drive protocol:
//! it decodes the control word written by the master, walks its own power
//! state machine, reports the matching status word and follows the cyclic
//! set-points while operation is enabled. Used for development and testing
//! without physical hardware.

use heapless::Vec;
use tracing::{debug, info, warn};

use cdpr_common::consts::MAX_DRIVES;
use cdpr_common::drive::{ControlWord, DriveState, OperationMode, StatusWord};

use crate::drive::{AXIS_IMAGE_SIZE, InputPdos, OutputPdos, PdoOffsets};
use crate::fieldbus::{Fieldbus, FieldbusError, check_domain};

/// Simulated cycles per second; velocity is integrated per cycle.
pub const SIM_CYCLES_PER_SEC: i32 = 1000;

// ─── Device Commands ────────────────────────────────────────────────

/// Command pattern decoded from a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceCommand {
    DisableVoltage,
    QuickStop,
    Shutdown,
    /// Also `DisableOperation` when operation is enabled.
    SwitchOn,
    EnableOperation,
}

impl DeviceCommand {
    const fn decode(cw: u16) -> Option<Self> {
        if cw & 0x0002 == 0 {
            Some(Self::DisableVoltage)
        } else if cw & 0x0006 == 0x0002 {
            Some(Self::QuickStop)
        } else if cw & 0x0087 == 0x0006 {
            Some(Self::Shutdown)
        } else if cw & 0x008F == 0x0007 {
            Some(Self::SwitchOn)
        } else if cw & 0x008F == 0x000F {
            Some(Self::EnableOperation)
        } else {
            None
        }
    }
}

/// Status word a device reports in `state`.
pub const fn status_word_for(state: DriveState) -> u16 {
    match state {
        DriveState::Start | DriveState::NotReadyToSwitchOn | DriveState::SwitchOnDisabled => {
            0x0040
        }
        DriveState::ReadyToSwitchOn => 0x0021,
        DriveState::SwitchedOn => 0x0023,
        DriveState::OperationEnabled => 0x0027,
        DriveState::QuickStopActive => 0x0007,
        DriveState::FaultReactionActive => 0x000F,
        DriveState::Fault => 0x0008,
    }
}

fn next_state(state: DriveState, command: DeviceCommand) -> DriveState {
    use DeviceCommand::*;
    use DriveState::*;

    match (state, command) {
        (ReadyToSwitchOn | SwitchedOn | OperationEnabled | QuickStopActive, DisableVoltage) => {
            SwitchOnDisabled
        }
        (OperationEnabled, QuickStop) => QuickStopActive,
        (ReadyToSwitchOn | SwitchedOn, QuickStop) => SwitchOnDisabled,
        (SwitchOnDisabled | SwitchedOn | OperationEnabled, Shutdown) => ReadyToSwitchOn,
        (ReadyToSwitchOn | OperationEnabled, SwitchOn) => SwitchedOn,
        (SwitchedOn | QuickStopActive, EnableOperation) => OperationEnabled,
        (state, _) => state,
    }
}

// ─── Simulated Device ───────────────────────────────────────────────

/// Device side of one servo amplifier.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    offsets: PdoOffsets,
    state: DriveState,
    last_control: ControlWord,
    fault_pending: bool,
    display_op_mode: OperationMode,
    position: i32,
    velocity: i32,
    torque: i16,
    digital_inputs: u32,
}

impl SimulatedDevice {
    /// Device still initializing; it reaches `SwitchOnDisabled` on its first
    /// cycle.
    pub fn new(offsets: PdoOffsets) -> Self {
        Self {
            offsets,
            state: DriveState::NotReadyToSwitchOn,
            last_control: ControlWord::empty(),
            fault_pending: false,
            display_op_mode: OperationMode::None,
            position: 0,
            velocity: 0,
            torque: 0,
            digital_inputs: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> DriveState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> i32 {
        self.position
    }

    #[inline]
    pub fn velocity(&self) -> i32 {
        self.velocity
    }

    #[inline]
    pub fn torque(&self) -> i16 {
        self.torque
    }

    #[inline]
    pub fn offsets(&self) -> &PdoOffsets {
        &self.offsets
    }

    /// Encoder position, e.g. to simulate a non-zero start pose.
    pub fn set_position(&mut self, position: i32) {
        self.position = position;
    }

    pub fn set_digital_inputs(&mut self, inputs: u32) {
        self.digital_inputs = inputs;
    }

    /// Raise a fault; the device enters `FaultReactionActive` on its next
    /// cycle and latches `Fault` one cycle later.
    pub fn inject_fault(&mut self) {
        self.fault_pending = true;
    }

    /// Inputs as the device reports them.
    pub fn inputs(&self) -> InputPdos {
        InputPdos {
            status_word: StatusWord::from_raw(status_word_for(self.state)),
            display_op_mode: self.display_op_mode,
            position: self.position,
            velocity: self.velocity,
            torque: self.torque,
            digital_inputs: self.digital_inputs,
            aux_position: self.position,
        }
    }

    /// Advance one cycle with the outputs written by the master.
    pub fn step(&mut self, outputs: &OutputPdos) {
        let cw = outputs.control_word;
        let reset_edge = cw.fault_reset() && !self.last_control.fault_reset();
        self.last_control = cw;

        let next = if self.fault_pending {
            self.fault_pending = false;
            DriveState::FaultReactionActive
        } else {
            match self.state {
                DriveState::Start | DriveState::NotReadyToSwitchOn => DriveState::SwitchOnDisabled,
                DriveState::FaultReactionActive => DriveState::Fault,
                DriveState::Fault if reset_edge => DriveState::SwitchOnDisabled,
                DriveState::Fault => DriveState::Fault,
                state => match DeviceCommand::decode(cw.raw()) {
                    Some(command) => next_state(state, command),
                    None => state,
                },
            }
        };
        if next != self.state {
            debug!("sim device {} -> {next}", self.state);
            self.state = next;
        }
        self.follow(outputs);
    }

    fn follow(&mut self, outputs: &OutputPdos) {
        if self.state.accepts_setpoints() {
            self.display_op_mode = outputs.op_mode;
        }
        if self.state != DriveState::OperationEnabled {
            self.velocity = 0;
            self.torque = 0;
            return;
        }
        match outputs.op_mode {
            OperationMode::CyclicPosition => {
                self.velocity = outputs
                    .target_position
                    .wrapping_sub(self.position)
                    .saturating_mul(SIM_CYCLES_PER_SEC);
                self.position = outputs.target_position;
            }
            OperationMode::CyclicVelocity => {
                self.velocity = outputs.target_velocity;
                self.position = self
                    .position
                    .wrapping_add(self.velocity / SIM_CYCLES_PER_SEC);
            }
            OperationMode::CyclicTorque => {
                self.torque = outputs.target_torque;
            }
            OperationMode::None => {}
        }
    }
}

// ─── Simulated Bus ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct FaultPlan {
    device: usize,
    after_cycles: u64,
}

/// Bus of simulated devices laid out with [`PdoOffsets::for_axis`].
#[derive(Debug)]
pub struct SimulatedBus {
    devices: Vec<SimulatedDevice, MAX_DRIVES>,
    cycle: u64,
    fault: Option<FaultPlan>,
}

impl SimulatedBus {
    pub fn new(count: usize) -> Result<Self, FieldbusError> {
        if count > MAX_DRIVES {
            return Err(FieldbusError::TooManyDevices {
                requested: count,
                max: MAX_DRIVES,
            });
        }
        let mut devices = Vec::new();
        for index in 0..count {
            // Capacity checked above.
            let _ = devices.push(SimulatedDevice::new(PdoOffsets::for_axis(index)));
        }
        info!("simulated bus with {count} devices");
        Ok(Self {
            devices,
            cycle: 0,
            fault: None,
        })
    }

    /// Fault device `device` once, on send number `after_cycles`.
    pub fn with_fault(mut self, device: usize, after_cycles: u64) -> Self {
        self.fault = Some(FaultPlan {
            device,
            after_cycles,
        });
        self
    }

    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn devices(&self) -> &[SimulatedDevice] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&SimulatedDevice> {
        self.devices.get(index)
    }

    pub fn device_mut(&mut self, index: usize) -> Option<&mut SimulatedDevice> {
        self.devices.get_mut(index)
    }

    fn image_size(&self) -> usize {
        self.devices.len() * AXIS_IMAGE_SIZE
    }
}

impl Fieldbus for SimulatedBus {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn receive(&mut self, domain: &mut [u8]) -> Result<(), FieldbusError> {
        check_domain(domain, self.image_size())?;
        for device in &self.devices {
            device.inputs().write(domain, &device.offsets)?;
        }
        Ok(())
    }

    fn send(&mut self, domain: &[u8]) -> Result<(), FieldbusError> {
        check_domain(domain, self.image_size())?;
        self.cycle += 1;

        if let Some(plan) = self.fault {
            if plan.after_cycles <= self.cycle {
                self.fault = None;
                match self.devices.get_mut(plan.device) {
                    Some(device) => {
                        warn!("injecting fault into device {} at cycle {}", plan.device, self.cycle);
                        device.inject_fault();
                    }
                    None => warn!("fault plan targets unknown device {}", plan.device),
                }
            }
        }

        for device in self.devices.iter_mut() {
            let outputs = OutputPdos::read(domain, &device.offsets)?;
            device.step(&outputs);
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
