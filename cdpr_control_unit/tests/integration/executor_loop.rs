//! Integration test: the cycle runner bound to a cyclic executor.
//!
//! Executors run under the time-sharing policy so no privileges are needed.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use cdpr_common::drive::DriveState;
use cdpr_control_unit::cycle::bind;
use cdpr_rt::prelude::*;

use super::sim_runner;

const PERIOD_NS: u64 = 2_000_000;

fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

#[test]
fn executor_powers_up_and_disables_on_stop() {
    let mut runner = sim_runner(3);
    runner.set_auto_enable(true);
    let runner = Arc::new(Mutex::new(runner));

    let mut exec = CyclicExecutor::new("cu-test");
    bind(&runner, &exec).unwrap();
    exec.start(PERIOD_NS).unwrap();

    assert!(wait_for(Duration::from_secs(2), || runner.lock().all_enabled()));
    assert!(runner.lock().stats().cycles > 0);

    exec.stop();
    let runner = runner.lock();
    assert!(!runner.auto_enable());
    for (drive, device) in runner.drives().iter().zip(runner.bus().devices()) {
        assert_eq!(drive.state(), DriveState::SwitchOnDisabled);
        assert_eq!(device.state(), DriveState::SwitchOnDisabled);
    }
}

#[test]
fn stalled_cycle_triggers_emergency_stop() {
    let mut runner = sim_runner(2);
    runner.set_auto_enable(true);
    let runner = Arc::new(Mutex::new(runner));

    let mut exec = CyclicExecutor::new("cu-stall");
    exec.set_deadline_mode(DeadlineMode::Enforce);
    bind(&runner, &exec).unwrap();
    exec.start(5_000_000).unwrap();

    assert!(wait_for(Duration::from_secs(2), || runner.lock().all_enabled()));

    // Hold the runner across several periods: the loop blocks and misses.
    {
        let _guard = runner.lock();
        thread::sleep(Duration::from_millis(30));
    }

    assert!(wait_for(Duration::from_secs(2), || !exec.is_active()));
    assert!(exec.deadline_missed());
    exec.stop();

    let runner = runner.lock();
    assert!(!runner.auto_enable());
    for (drive, device) in runner.drives().iter().zip(runner.bus().devices()) {
        assert_eq!(drive.state(), DriveState::QuickStopActive);
        assert_eq!(device.state(), DriveState::QuickStopActive);
    }
}

#[test]
fn runner_rebinds_after_stop() {
    let runner = Arc::new(Mutex::new(sim_runner(1)));
    let mut exec = CyclicExecutor::new("cu-rebind");
    bind(&runner, &exec).unwrap();
    exec.start(PERIOD_NS).unwrap();
    assert!(wait_for(Duration::from_secs(1), || runner.lock().stats().cycles >= 3));
    exec.stop();

    let before = runner.lock().stats().cycles;
    bind(&runner, &exec).unwrap();
    exec.start(PERIOD_NS).unwrap();
    assert!(wait_for(Duration::from_secs(1), || {
        runner.lock().stats().cycles >= before + 3
    }));
    exec.stop();
}
