//! Control cycle: receive → drives → send.
//!
//! [`CycleRunner`] owns the fieldbus, the process-data domain and one
//! [`DriveStateMachine`] per axis. [`bind`] installs the runner as the loop
//! of a [`CyclicExecutor`], which provides pacing, CPU placement and the
//! deadline check.
//!
//! ## Cycle Body
//! 1. `Fieldbus::receive` fills the input entries of the domain.
//! 2. Every drive parses its inputs and follows the reported state.
//! 3. Events posted since the last cycle are dispatched in order.
//! 4. With auto-enable on, every drive takes one power-up step.
//! 5. Every drive writes its outputs.
//! 6. `Fieldbus::send` hands the domain to the bus.
//!
//! All state is pre-allocated; the cycle performs no heap allocation.

use std::sync::Arc;
use std::time::Instant;

use heapless::{Deque, Vec};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use cdpr_common::consts::MAX_DRIVES;
use cdpr_common::drive::DriveState;
use cdpr_rt::RtError;
use cdpr_rt::executor::CyclicExecutor;

use crate::drive::{
    AXIS_IMAGE_SIZE, DriveEvent, DriveStateMachine, PdoError, PdoOffsets, Transition,
};
use crate::fieldbus::{Fieldbus, FieldbusError};

/// Domain capacity for [`MAX_DRIVES`] axes.
pub const DOMAIN_CAPACITY: usize = MAX_DRIVES * AXIS_IMAGE_SIZE;

/// Events that can be posted between two cycles.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Timing of the cycle body, updated in O(1) without allocation.
///
/// Mean and variance are accumulated online (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    pub cycles: u64,
    pub last_ns: u64,
    /// 0 until the first cycle.
    pub min_ns: u64,
    pub max_ns: u64,
    /// Bodies longer than the cycle budget.
    pub overruns: u64,
    /// Bodies that returned an error.
    pub errors: u64,
    mean_ns: f64,
    m2: f64,
}

impl CycleStats {
    /// Account one body of `elapsed_ns`. A zero budget disables overruns.
    #[inline]
    pub fn record(&mut self, elapsed_ns: u64, budget_ns: u64) {
        self.cycles += 1;
        self.last_ns = elapsed_ns;
        self.min_ns = if self.cycles == 1 {
            elapsed_ns
        } else {
            self.min_ns.min(elapsed_ns)
        };
        self.max_ns = self.max_ns.max(elapsed_ns);
        if budget_ns != 0 && elapsed_ns > budget_ns {
            self.overruns += 1;
        }

        let x = elapsed_ns as f64;
        let delta = x - self.mean_ns;
        self.mean_ns += delta / self.cycles as f64;
        self.m2 += delta * (x - self.mean_ns);
    }

    #[inline]
    pub fn mean_ns(&self) -> f64 {
        self.mean_ns
    }

    /// Population standard deviation.
    pub fn stddev_ns(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            (self.m2 / self.cycles as f64).sqrt()
        }
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during cycle setup or execution.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("no drives configured")]
    NoDrives,

    #[error("too many drives: {count} (max {max})", max = MAX_DRIVES)]
    TooManyDrives { count: usize },

    /// Bus and runner disagree on the number of axes.
    #[error("bus has {bus} devices, {drives} drives configured")]
    DeviceCount { bus: usize, drives: usize },

    /// Bus position out of range or used twice.
    #[error("drive {id}: bus position {position} is out of range or taken")]
    BusPosition { id: u16, position: usize },

    #[error("no drive at index {0}")]
    UnknownDrive(usize),

    #[error("event queue full ({} events)", EVENT_QUEUE_CAPACITY)]
    EventQueueFull,

    #[error("process data error: {0}")]
    Pdo(#[from] PdoError),

    #[error("fieldbus error: {0}")]
    Fieldbus(#[from] FieldbusError),

    #[error("RT error: {0}")]
    Rt(#[from] RtError),

    /// The executor ended on a missed deadline.
    #[error("executor '{0}' missed a deadline")]
    DeadlineMissed(String),
}

// ─── Power-Up Sequencing ────────────────────────────────────────────

/// Issue the next command of the enable sequence for `drive`.
///
/// A latched fault is reset; a running fault reaction is waited out.
pub fn power_up_step(drive: &mut DriveStateMachine) -> Option<Transition> {
    match drive.state() {
        DriveState::SwitchOnDisabled => Some(drive.shutdown()),
        DriveState::ReadyToSwitchOn => Some(drive.switch_on()),
        DriveState::SwitchedOn | DriveState::QuickStopActive => Some(drive.enable_operation()),
        DriveState::Fault => Some(drive.fault_reset()),
        _ => None,
    }
}

// ─── Snapshots ──────────────────────────────────────────────────────

/// Status of one drive, copied out of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveStatus {
    pub id: u16,
    pub state: DriveState,
    pub position: i32,
    pub velocity: i32,
    pub torque: i16,
}

impl From<&DriveStateMachine> for DriveStatus {
    fn from(drive: &DriveStateMachine) -> Self {
        Self {
            id: drive.id(),
            state: drive.state(),
            position: drive.position(),
            velocity: drive.velocity(),
            torque: drive.torque(),
        }
    }
}

/// Fixed-size copy of the runner state for reporting outside the lock.
#[derive(Debug, Clone)]
pub struct RunnerSnapshot {
    pub drives: Vec<DriveStatus, MAX_DRIVES>,
    pub stats: CycleStats,
}

// ─── Cycle Runner ───────────────────────────────────────────────────

/// Drives plus the bus they are attached to.
pub struct CycleRunner<B: Fieldbus> {
    bus: B,
    drives: Vec<DriveStateMachine, MAX_DRIVES>,
    events: Deque<(usize, DriveEvent), EVENT_QUEUE_CAPACITY>,
    domain: [u8; DOMAIN_CAPACITY],
    domain_len: usize,
    auto_enable: bool,
    budget_ns: u64,
    stats: CycleStats,
}

impl<B: Fieldbus> CycleRunner<B> {
    /// One drive per id, axis `i` at [`PdoOffsets::for_axis`]`(i)`.
    pub fn new(bus: B, ids: &[u16]) -> Result<Self, CycleError> {
        let mut layout: Vec<(u16, usize), MAX_DRIVES> = Vec::new();
        for (index, &id) in ids.iter().enumerate() {
            if layout.push((id, index)).is_err() {
                return Err(CycleError::TooManyDrives { count: ids.len() });
            }
        }
        Self::with_layout(bus, &layout)
    }

    /// One drive per `(id, bus position)`. Drives keep the given order;
    /// their process data sits at the bus position.
    pub fn with_layout(bus: B, layout: &[(u16, usize)]) -> Result<Self, CycleError> {
        if layout.is_empty() {
            return Err(CycleError::NoDrives);
        }
        if layout.len() > MAX_DRIVES {
            return Err(CycleError::TooManyDrives {
                count: layout.len(),
            });
        }
        if bus.device_count() != layout.len() {
            return Err(CycleError::DeviceCount {
                bus: bus.device_count(),
                drives: layout.len(),
            });
        }

        let domain_len = layout.len() * AXIS_IMAGE_SIZE;
        let mut taken = [false; MAX_DRIVES];
        let mut drives = Vec::new();
        for &(id, position) in layout {
            if position >= layout.len() || taken[position] {
                return Err(CycleError::BusPosition { id, position });
            }
            taken[position] = true;

            let offsets = PdoOffsets::for_axis(position);
            offsets.validate(domain_len)?;
            if drives.push(DriveStateMachine::new(id, offsets)).is_err() {
                return Err(CycleError::TooManyDrives {
                    count: layout.len(),
                });
            }
        }
        info!(
            "cycle runner: {} drives on '{}' bus, domain {domain_len} bytes",
            layout.len(),
            bus.name()
        );

        Ok(Self {
            bus,
            drives,
            events: Deque::new(),
            domain: [0; DOMAIN_CAPACITY],
            domain_len,
            auto_enable: false,
            budget_ns: 0,
            stats: CycleStats::default(),
        })
    }

    /// Walk every drive towards `OperationEnabled`, one step per cycle.
    pub fn set_auto_enable(&mut self, enabled: bool) {
        self.auto_enable = enabled;
    }

    #[inline]
    pub fn auto_enable(&self) -> bool {
        self.auto_enable
    }

    /// Cycle budget for overrun accounting; 0 disables it.
    pub fn set_budget_ns(&mut self, budget_ns: u64) {
        self.budget_ns = budget_ns;
    }

    /// Queue `event` for drive `index`; it is dispatched in the next cycle,
    /// after the inputs have been read.
    pub fn post_event(&mut self, index: usize, event: DriveEvent) -> Result<(), CycleError> {
        if index >= self.drives.len() {
            return Err(CycleError::UnknownDrive(index));
        }
        self.events
            .push_back((index, event))
            .map_err(|_| CycleError::EventQueueFull)
    }

    #[inline]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// One full exchange.
    pub fn cycle_body(&mut self) -> Result<(), CycleError> {
        let start = Instant::now();
        let domain = &mut self.domain[..self.domain_len];

        self.bus.receive(domain)?;
        for drive in self.drives.iter_mut() {
            drive.read_inputs(domain)?;
        }
        while let Some((index, event)) = self.events.pop_front() {
            if let Some(drive) = self.drives.get_mut(index) {
                drive.handle_event(event);
            }
        }
        for drive in self.drives.iter_mut() {
            if self.auto_enable {
                power_up_step(drive);
            }
            drive.write_outputs(domain)?;
        }
        self.bus.send(domain)?;

        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.stats.record(elapsed, self.budget_ns);
        Ok(())
    }

    /// Quick-stop every drive and flush the outputs. Stops auto-enable.
    pub fn emergency_stop(&mut self) -> Result<(), CycleError> {
        warn!("emergency stop: quick-stopping {} drives", self.drives.len());
        self.auto_enable = false;
        self.events.clear();
        for drive in self.drives.iter_mut() {
            drive.quick_stop();
        }
        self.flush()
    }

    /// Remove drive voltage on every drive and flush the outputs.
    pub fn disable_all(&mut self) -> Result<(), CycleError> {
        info!("disabling {} drives", self.drives.len());
        self.auto_enable = false;
        self.events.clear();
        for drive in self.drives.iter_mut() {
            drive.disable_voltage();
        }
        self.flush()
    }

    fn flush(&mut self) -> Result<(), CycleError> {
        let domain = &mut self.domain[..self.domain_len];
        for drive in self.drives.iter() {
            drive.write_outputs(domain)?;
        }
        self.bus.send(domain)?;
        Ok(())
    }

    /// True once every drive is in `OperationEnabled`.
    pub fn all_enabled(&self) -> bool {
        self.drives
            .iter()
            .all(|d| d.state() == DriveState::OperationEnabled)
    }

    pub fn any_fault(&self) -> bool {
        self.drives.iter().any(|d| d.state().is_fault())
    }

    pub fn drives(&self) -> &[DriveStateMachine] {
        &self.drives
    }

    pub fn drive(&self, index: usize) -> Option<&DriveStateMachine> {
        self.drives.get(index)
    }

    /// Mutable drive, for issuing events between cycles.
    pub fn drive_mut(&mut self, index: usize) -> Option<&mut DriveStateMachine> {
        self.drives.get_mut(index)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn domain(&self) -> &[u8] {
        &self.domain[..self.domain_len]
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// Copy drive status and statistics. No allocation; callers sharing the
    /// runner with the RT loop should log only after releasing the lock.
    pub fn snapshot(&self) -> RunnerSnapshot {
        let mut drives = Vec::new();
        for drive in self.drives.iter() {
            // Same capacity as `self.drives`.
            let _ = drives.push(DriveStatus::from(drive));
        }
        RunnerSnapshot {
            drives,
            stats: self.stats,
        }
    }
}

// ─── Executor Binding ───────────────────────────────────────────────

/// Install `runner` as the callbacks of `executor`.
///
/// - loop: [`CycleRunner::cycle_body`]; errors are logged and counted.
/// - end: [`CycleRunner::disable_all`].
/// - emergency exit: [`CycleRunner::emergency_stop`].
pub fn bind<B: Fieldbus + 'static>(
    runner: &Arc<Mutex<CycleRunner<B>>>,
    executor: &CyclicExecutor,
) -> Result<(), RtError> {
    let name = executor.name().to_owned();
    let drives = runner.lock().drives().len();
    executor.set_init(move || info!("[{name}] control loop started ({drives} drives)"));

    let r = Arc::clone(runner);
    executor.set_loop(move || {
        let mut runner = r.lock();
        if let Err(e) = runner.cycle_body() {
            runner.stats.errors += 1;
            error!("cycle failed: {e}");
        }
    })?;

    let r = Arc::clone(runner);
    executor.set_end(move || {
        if let Err(e) = r.lock().disable_all() {
            error!("disable on exit failed: {e}");
        }
    });

    let r = Arc::clone(runner);
    executor.set_emergency_exit(move || {
        if let Err(e) = r.lock().emergency_stop() {
            error!("emergency stop failed: {e}");
        }
    });
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
