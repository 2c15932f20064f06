//! Integration test: drive state machines sharing one process domain.
//!
//! Validates: status-word decode through the domain, per-axis offsets,
//! event guards and selective output writes.

use cdpr_common::drive::{DriveState, OperationMode, StatusWord};
use cdpr_control_unit::drive::{
    AXIS_IMAGE_SIZE, DriveStateMachine, InputPdos, OutputPdos, PdoOffsets, Transition,
};

const AXES: usize = 2;

struct Domain {
    bytes: [u8; AXES * AXIS_IMAGE_SIZE],
}

impl Domain {
    fn new() -> Self {
        Self {
            bytes: [0; AXES * AXIS_IMAGE_SIZE],
        }
    }

    /// Device side: report `status` and `position` for `axis`.
    fn report(&mut self, axis: usize, status: u16, position: i32) {
        let inputs = InputPdos {
            status_word: StatusWord::from_raw(status),
            position,
            display_op_mode: OperationMode::CyclicPosition,
            ..Default::default()
        };
        inputs
            .write(&mut self.bytes, &PdoOffsets::for_axis(axis))
            .unwrap();
    }

    /// Device side: what the master wrote for `axis`.
    fn outputs(&self, axis: usize) -> OutputPdos {
        OutputPdos::read(&self.bytes, &PdoOffsets::for_axis(axis)).unwrap()
    }
}

fn drives() -> [DriveStateMachine; AXES] {
    [
        DriveStateMachine::new(10, PdoOffsets::for_axis(0)),
        DriveStateMachine::new(11, PdoOffsets::for_axis(1)),
    ]
}

#[test]
fn decode_table_drives_tracked_state() {
    let cases = [
        (0x0040, DriveState::SwitchOnDisabled),
        (0x0021, DriveState::ReadyToSwitchOn),
        (0x0023, DriveState::SwitchedOn),
        (0x0027, DriveState::OperationEnabled),
        (0x0007, DriveState::QuickStopActive),
        (0x000F, DriveState::FaultReactionActive),
        (0x0008, DriveState::Fault),
    ];
    let mut domain = Domain::new();
    let [mut drive, _] = drives();
    for (status, expected) in cases {
        domain.report(0, status, 0);
        assert_eq!(drive.read_inputs(&domain.bytes).unwrap(), expected, "{status:#06x}");
    }
}

#[test]
fn axes_read_their_own_entries() {
    let mut domain = Domain::new();
    let [mut a, mut b] = drives();
    domain.report(0, 0x0021, 100);
    domain.report(1, 0x0008, -200);

    a.read_inputs(&domain.bytes).unwrap();
    b.read_inputs(&domain.bytes).unwrap();
    assert_eq!((a.state(), a.position()), (DriveState::ReadyToSwitchOn, 100));
    assert_eq!((b.state(), b.position()), (DriveState::Fault, -200));
    assert_eq!(b.aux_position(), 0);
}

#[test]
fn enable_is_ignored_until_switched_on() {
    let mut domain = Domain::new();
    let [mut drive, _] = drives();

    domain.report(0, 0x0040, 0);
    drive.read_inputs(&domain.bytes).unwrap();
    assert_eq!(drive.enable_operation(), Transition::Ignored);
    drive.write_outputs(&mut domain.bytes).unwrap();
    assert_eq!(domain.outputs(0).control_word.raw(), 0x0000);

    assert!(drive.shutdown().is_accepted());
    domain.report(0, 0x0021, 0);
    drive.read_inputs(&domain.bytes).unwrap();
    assert!(drive.switch_on().is_accepted());
    domain.report(0, 0x0023, 0);
    drive.read_inputs(&domain.bytes).unwrap();

    assert_eq!(
        drive.enable_operation(),
        Transition::Goto(DriveState::OperationEnabled)
    );
    drive.write_outputs(&mut domain.bytes).unwrap();
    assert_eq!(domain.outputs(0).control_word.raw(), 0x000F);
}

#[test]
fn targets_reach_domain_only_when_powered() {
    let mut domain = Domain::new();
    let [_, mut drive] = drives();

    domain.report(1, 0x0027, 42);
    drive.read_inputs(&domain.bytes).unwrap();
    assert_eq!(drive.state(), DriveState::OperationEnabled);
    drive.change_position(500);
    drive.write_outputs(&mut domain.bytes).unwrap();
    assert_eq!(domain.outputs(1).target_position, 500);
    // Axis 0 untouched.
    assert_eq!(domain.outputs(0), OutputPdos::default());

    domain.report(1, 0x0027, 500);
    drive.read_inputs(&domain.bytes).unwrap();
    drive.change_delta_position(10);
    assert_eq!(drive.outputs().target_position, 510);

    domain.report(1, 0x0008, 510);
    drive.read_inputs(&domain.bytes).unwrap();
    drive.change_position(9999);
    let mut fresh = Domain::new();
    drive.write_outputs(&mut fresh.bytes).unwrap();
    assert_eq!(fresh.outputs(1).target_position, 0);
    assert_eq!(fresh.outputs(1).op_mode, OperationMode::CyclicPosition);
}

#[test]
fn hardware_drop_out_reverts_tracked_state() {
    let mut domain = Domain::new();
    let [mut drive, _] = drives();

    domain.report(0, 0x0023, 0);
    drive.read_inputs(&domain.bytes).unwrap();
    drive.enable_operation();
    assert_eq!(drive.state(), DriveState::OperationEnabled);

    // Device never followed.
    drive.read_inputs(&domain.bytes).unwrap();
    assert_eq!(drive.state(), DriveState::SwitchedOn);
    assert_eq!(drive.previous_state(), DriveState::OperationEnabled);
}
