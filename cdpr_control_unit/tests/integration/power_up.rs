//! Integration test: power-up, set-points and fault recovery on the
//! simulated fieldbus, without an executor.

use cdpr_common::drive::{DriveState, OperationMode};
use cdpr_control_unit::cycle::CycleRunner;
use cdpr_control_unit::drive::DriveEvent;
use cdpr_control_unit::sim::SimulatedBus;

use super::{cycle_until, sim_runner};

fn enabled_runner(n: usize) -> CycleRunner<SimulatedBus> {
    let mut runner = sim_runner(n);
    runner.set_auto_enable(true);
    let cycles = cycle_until(&mut runner, 20, |r| r.all_enabled());
    assert!(cycles.is_some(), "drives never reached OperationEnabled");
    runner.set_auto_enable(false);
    runner
}

#[test]
fn all_drives_power_up() {
    let runner = enabled_runner(4);
    for (drive, device) in runner.drives().iter().zip(runner.bus().devices()) {
        assert_eq!(drive.state(), DriveState::OperationEnabled);
        assert_eq!(device.state(), DriveState::OperationEnabled);
        assert_eq!(drive.outputs().op_mode, OperationMode::CyclicPosition);
    }
    assert_eq!(runner.drives().iter().map(|d| d.id()).collect::<Vec<_>>(), [1, 2, 3, 4]);
}

#[test]
fn enabling_holds_the_start_pose() {
    let mut runner = sim_runner(1);
    runner.bus_mut().device_mut(0).unwrap().set_position(12_345);
    runner.set_auto_enable(true);
    cycle_until(&mut runner, 20, |r| r.all_enabled()).unwrap();
    runner.cycle_body().unwrap();

    assert_eq!(runner.bus().device(0).unwrap().position(), 12_345);
    assert_eq!(runner.drive(0).unwrap().position(), 12_345);
}

#[test]
fn position_set_points_are_followed() {
    let mut runner = enabled_runner(2);

    assert!(runner.drive_mut(0).unwrap().change_position(1000).is_accepted());
    runner.cycle_body().unwrap();
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().position(), 1000);
    assert_eq!(runner.drive(1).unwrap().position(), 0);

    runner.drive_mut(0).unwrap().change_delta_position(-250);
    runner.cycle_body().unwrap();
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().position(), 750);
}

#[test]
fn velocity_set_point_moves_axis() {
    let mut runner = enabled_runner(1);
    runner.drive_mut(0).unwrap().change_velocity(10_000);
    for _ in 0..11 {
        runner.cycle_body().unwrap();
    }
    let drive = runner.drive(0).unwrap();
    assert_eq!(drive.velocity(), 10_000);
    assert_eq!(drive.inputs().display_op_mode, OperationMode::CyclicVelocity);
    assert_eq!(drive.position(), 100);
}

#[test]
fn injected_fault_is_latched_then_reset() {
    let mut runner = enabled_runner(2);
    runner.bus_mut().device_mut(1).unwrap().inject_fault();

    let cycles = cycle_until(&mut runner, 5, |r| r.drive(1).unwrap().state() == DriveState::Fault);
    assert!(cycles.is_some());
    assert!(runner.any_fault());
    assert_eq!(runner.drive(1).unwrap().previous_state(), DriveState::FaultReactionActive);
    assert_eq!(runner.drive(0).unwrap().state(), DriveState::OperationEnabled);

    // Without auto-enable the fault stays latched.
    for _ in 0..5 {
        runner.cycle_body().unwrap();
    }
    assert_eq!(runner.drive(1).unwrap().state(), DriveState::Fault);

    runner.set_auto_enable(true);
    assert!(cycle_until(&mut runner, 20, |r| r.all_enabled()).is_some());
    assert!(!runner.any_fault());
}

#[test]
fn planned_fault_fires_on_schedule() {
    let bus = SimulatedBus::new(2).unwrap().with_fault(0, 10);
    let mut runner = CycleRunner::new(bus, &[7, 8]).unwrap();
    for _ in 0..9 {
        runner.cycle_body().unwrap();
    }
    assert!(!runner.any_fault());
    runner.cycle_body().unwrap();
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().state(), DriveState::FaultReactionActive);
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().state(), DriveState::Fault);
}

#[test]
fn emergency_stop_then_disable() {
    let mut runner = enabled_runner(3);
    runner.emergency_stop().unwrap();
    runner.cycle_body().unwrap();
    for drive in runner.drives() {
        assert_eq!(drive.state(), DriveState::QuickStopActive);
    }

    runner.disable_all().unwrap();
    runner.cycle_body().unwrap();
    for (drive, device) in runner.drives().iter().zip(runner.bus().devices()) {
        assert_eq!(drive.state(), DriveState::SwitchOnDisabled);
        assert_eq!(device.state(), DriveState::SwitchOnDisabled);
    }
}

#[test]
fn quick_stop_recovers_through_enable() {
    let mut runner = enabled_runner(1);
    runner.post_event(0, DriveEvent::QuickStop).unwrap();
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().state(), DriveState::QuickStopActive);
    assert_eq!(runner.bus().devices()[0].state(), DriveState::QuickStopActive);

    runner.post_event(0, DriveEvent::EnableOperation).unwrap();
    runner.cycle_body().unwrap();
    runner.cycle_body().unwrap();
    assert_eq!(runner.drive(0).unwrap().state(), DriveState::OperationEnabled);
    assert_eq!(runner.bus().devices()[0].state(), DriveState::OperationEnabled);
}

#[test]
fn events_posted_before_enable_are_ignored() {
    let mut runner = sim_runner(1);
    runner.cycle_body().unwrap();
    runner.post_event(0, DriveEvent::ChangeVelocity(500)).unwrap();
    runner.post_event(0, DriveEvent::EnableOperation).unwrap();
    runner.cycle_body().unwrap();
    let drive = runner.drive(0).unwrap();
    assert_eq!(drive.state(), DriveState::SwitchOnDisabled);
    assert_eq!(drive.outputs().target_velocity, 0);
    assert_eq!(drive.outputs().control_word.raw(), 0);
}
