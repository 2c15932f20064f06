mod config_loading;
mod drive_protocol;
mod executor_loop;
mod power_up;

use cdpr_control_unit::cycle::CycleRunner;
use cdpr_control_unit::fieldbus::Fieldbus;
use cdpr_control_unit::sim::SimulatedBus;

/// Runner on a simulated bus with drive ids `1..=n`.
pub fn sim_runner(n: usize) -> CycleRunner<SimulatedBus> {
    let ids: Vec<u16> = (1..=n as u16).collect();
    CycleRunner::new(SimulatedBus::new(n).unwrap(), &ids).unwrap()
}

/// Run cycles until `cond` holds; returns the number of cycles taken.
pub fn cycle_until<B: Fieldbus>(
    runner: &mut CycleRunner<B>,
    max_cycles: usize,
    mut cond: impl FnMut(&CycleRunner<B>) -> bool,
) -> Option<usize> {
    for n in 1..=max_cycles {
        runner.cycle_body().unwrap();
        if cond(runner) {
            return Some(n);
        }
    }
    None
}
