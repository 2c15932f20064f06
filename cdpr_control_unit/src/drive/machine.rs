//! Per-axis drive state machine.
//!
//! Tracks the protocol state of one servo amplifier, turns named events into
//! control-word commands, and mirrors the axis' slice of the process image.
//!
//! Once per cycle, from a single context:
//! 1. [`read_inputs`](DriveStateMachine::read_inputs): parse inputs, decode the
//!    reported state, follow it if it differs from the tracked one.
//! 2. Issue events.
//! 3. [`write_outputs`](DriveStateMachine::write_outputs).
//!
//! Not internally synchronized.

use tracing::{debug, error, info};

use cdpr_common::drive::{DriveCommand, DriveState, OperationMode};

use super::pdo::{InputPdos, OutputPdos, PdoError, PdoOffsets};
use super::transition::{DriveEvent, Transition, transition};

/// Protocol state machine of one drive.
#[derive(Debug, Clone)]
pub struct DriveStateMachine {
    id: u16,
    state: DriveState,
    previous_state: DriveState,
    inputs: InputPdos,
    outputs: OutputPdos,
    offsets: PdoOffsets,
}

impl DriveStateMachine {
    /// New drive; the power-up states are passed through immediately, so the
    /// machine starts in `SwitchOnDisabled`.
    pub fn new(id: u16, offsets: PdoOffsets) -> Self {
        let mut drive = Self {
            id,
            state: DriveState::Start,
            previous_state: DriveState::Start,
            inputs: InputPdos::default(),
            outputs: OutputPdos::default(),
            offsets,
        };
        info!(drive = id, "initial state: {}", DriveState::Start);
        drive.enter(DriveState::NotReadyToSwitchOn, None);
        drive
    }

    // ── Cycle ──

    /// Parse the inputs of this axis and follow the reported state.
    ///
    /// A reported `OperationEnabled` is entered holding the actual value of
    /// the reported mode. A mode outside the cyclic ones leaves the outputs
    /// as they are, so it is never echoed back as "no mode". Other reported
    /// states are entered directly.
    pub fn read_inputs(&mut self, domain: &[u8]) -> Result<DriveState, PdoError> {
        self.inputs = InputPdos::read(domain, &self.offsets)?;
        let reported = self.reported_state();

        if reported.settled() != self.state.settled() {
            if reported == DriveState::OperationEnabled
                && self.inputs.display_op_mode != OperationMode::None
            {
                let command = self.hold_actual(self.inputs.display_op_mode);
                debug!(drive = self.id, "device entered {reported} in {}", command.mode);
                self.enter(reported, Some(command));
            } else {
                self.enter(reported, None);
            }
        }
        Ok(self.state)
    }

    /// Write control word and mode; targets only in `SwitchedOn` and
    /// `OperationEnabled`.
    pub fn write_outputs(&self, domain: &mut [u8]) -> Result<(), PdoError> {
        self.outputs
            .write(domain, &self.offsets, self.state.accepts_setpoints())
    }

    // ── Events ──

    /// Dispatch an event through the transition table.
    ///
    /// Control-word bits and targets change only when the event is accepted.
    pub fn handle_event(&mut self, event: DriveEvent) -> Transition {
        let result = transition(self.state, event, self.reported_state());
        match result {
            Transition::Goto(next) => {
                info!(drive = self.id, "received command: {event}");
                let command = self.apply(event);
                self.enter(next, command);
            }
            Transition::Ignored => {
                debug!(drive = self.id, "{event} ignored in {}", self.state);
            }
            Transition::CannotHappen => {
                error!(drive = self.id, "{event} cannot happen in {}", self.state);
            }
        }
        result
    }

    pub fn shutdown(&mut self) -> Transition {
        self.handle_event(DriveEvent::Shutdown)
    }

    /// Also pre-arms cyclic position mode holding the actual position.
    pub fn switch_on(&mut self) -> Transition {
        self.handle_event(DriveEvent::SwitchOn)
    }

    pub fn enable_operation(&mut self) -> Transition {
        self.handle_event(DriveEvent::EnableOperation)
    }

    pub fn disable_operation(&mut self) -> Transition {
        self.handle_event(DriveEvent::DisableOperation)
    }

    pub fn disable_voltage(&mut self) -> Transition {
        self.handle_event(DriveEvent::DisableVoltage)
    }

    pub fn quick_stop(&mut self) -> Transition {
        self.handle_event(DriveEvent::QuickStop)
    }

    pub fn fault_reset(&mut self) -> Transition {
        self.handle_event(DriveEvent::FaultReset)
    }

    pub fn change_position(&mut self, target: i32) -> Transition {
        self.handle_event(DriveEvent::ChangePosition(target))
    }

    /// Target = actual position + `delta` (wrapping, like the encoder count).
    pub fn change_delta_position(&mut self, delta: i32) -> Transition {
        self.handle_event(DriveEvent::ChangeDeltaPosition(delta))
    }

    pub fn change_velocity(&mut self, target: i32) -> Transition {
        self.handle_event(DriveEvent::ChangeVelocity(target))
    }

    /// Target = actual velocity + `delta`, saturating.
    pub fn change_delta_velocity(&mut self, delta: i32) -> Transition {
        self.handle_event(DriveEvent::ChangeDeltaVelocity(delta))
    }

    pub fn change_torque(&mut self, target: i16) -> Transition {
        self.handle_event(DriveEvent::ChangeTorque(target))
    }

    /// Target = actual torque + `delta`, saturating.
    pub fn change_delta_torque(&mut self, delta: i16) -> Transition {
        self.handle_event(DriveEvent::ChangeDeltaTorque(delta))
    }

    /// Switch mode, holding the actual value of the new mode.
    pub fn change_op_mode(&mut self, mode: OperationMode) -> Transition {
        self.handle_event(DriveEvent::ChangeOpMode(mode))
    }

    /// Hold the actual value in the reported mode.
    pub fn set_target_defaults(&mut self) -> Transition {
        self.handle_event(DriveEvent::SetTargetDefaults)
    }

    // ── Internals ──

    /// Control-word side effect of an accepted event, and its payload.
    fn apply(&mut self, event: DriveEvent) -> Option<DriveCommand> {
        let cw = &mut self.outputs.control_word;
        match event {
            DriveEvent::Shutdown => cw.apply_shutdown(),
            DriveEvent::SwitchOn => cw.apply_switch_on(),
            DriveEvent::EnableOperation => cw.apply_enable_operation(),
            DriveEvent::DisableOperation => cw.apply_disable_operation(),
            DriveEvent::DisableVoltage => cw.apply_disable_voltage(),
            DriveEvent::QuickStop => cw.apply_quick_stop(),
            DriveEvent::FaultReset => cw.apply_fault_reset(),
            _ => {}
        }

        let command = match event {
            DriveEvent::SwitchOn => {
                self.outputs.op_mode = OperationMode::CyclicPosition;
                self.outputs.target_position = self.inputs.position;
                None
            }
            DriveEvent::ChangePosition(target) => Some(DriveCommand::position(target)),
            DriveEvent::ChangeDeltaPosition(delta) => Some(DriveCommand::position(
                self.inputs.position.wrapping_add(delta),
            )),
            DriveEvent::ChangeVelocity(target) => Some(DriveCommand::velocity(target)),
            DriveEvent::ChangeDeltaVelocity(delta) => Some(DriveCommand::velocity(
                self.inputs.velocity.saturating_add(delta),
            )),
            DriveEvent::ChangeTorque(target) => Some(DriveCommand::torque_target(target)),
            DriveEvent::ChangeDeltaTorque(delta) => Some(DriveCommand::torque_target(
                self.inputs.torque.saturating_add(delta),
            )),
            DriveEvent::ChangeOpMode(mode) => Some(self.hold_actual(mode)),
            DriveEvent::SetTargetDefaults => Some(self.hold_actual(self.inputs.display_op_mode)),
            _ => None,
        };
        if let Some(cmd) = command {
            info!(drive = self.id, mode = %cmd.mode, target = cmd.value, "set-point");
        }
        command
    }

    /// Command holding the actual value of `mode`.
    fn hold_actual(&self, mode: OperationMode) -> DriveCommand {
        let value = match mode {
            OperationMode::CyclicPosition => self.inputs.position,
            OperationMode::CyclicVelocity => self.inputs.velocity,
            OperationMode::CyclicTorque => self.inputs.torque as i32,
            OperationMode::None => 0,
        };
        DriveCommand::new(mode, value)
    }

    /// Enter `next`, then follow automatic power-up successors.
    fn enter(&mut self, next: DriveState, mut command: Option<DriveCommand>) {
        let mut next = next;
        loop {
            if next != self.state {
                info!(drive = self.id, "state transition: {} --> {next}", self.state);
            }
            self.previous_state = self.state;
            self.state = next;

            if next == DriveState::OperationEnabled {
                if let Some(cmd) = command.take() {
                    self.apply_command(cmd);
                }
            }
            match next.auto_successor() {
                Some(successor) => next = successor,
                None => break,
            }
        }
    }

    /// Load a command into the output image. `None` mode leaves targets.
    fn apply_command(&mut self, cmd: DriveCommand) {
        self.outputs.op_mode = cmd.mode;
        match cmd.mode {
            OperationMode::CyclicPosition => self.outputs.target_position = cmd.value,
            OperationMode::CyclicVelocity => self.outputs.target_velocity = cmd.value,
            OperationMode::CyclicTorque => self.outputs.target_torque = cmd.torque(),
            OperationMode::None => {}
        }
    }

    // ── Accessors ──

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    #[inline]
    pub fn state(&self) -> DriveState {
        self.state
    }

    #[inline]
    pub fn previous_state(&self) -> DriveState {
        self.previous_state
    }

    /// State decoded from the last status word read.
    #[inline]
    pub fn reported_state(&self) -> DriveState {
        self.inputs.status_word.decode_state()
    }

    #[inline]
    pub fn position(&self) -> i32 {
        self.inputs.position
    }

    #[inline]
    pub fn aux_position(&self) -> i32 {
        self.inputs.aux_position
    }

    #[inline]
    pub fn velocity(&self) -> i32 {
        self.inputs.velocity
    }

    #[inline]
    pub fn torque(&self) -> i16 {
        self.inputs.torque
    }

    #[inline]
    pub fn digital_inputs(&self) -> u32 {
        self.inputs.digital_inputs
    }

    #[inline]
    pub fn inputs(&self) -> &InputPdos {
        &self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> &OutputPdos {
        &self.outputs
    }

    #[inline]
    pub fn offsets(&self) -> &PdoOffsets {
        &self.offsets
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
