//! Named cyclic real-time thread.
//!
//! A [`CyclicExecutor`] owns one OS thread that calls a loop callback once
//! per period, paced by a [`CycleClock`]. One mutex guards the callbacks and
//! the thread attributes; the loop callback runs while holding it, so
//! configuration calls from other threads never overlap a cycle.
//!
//! ## Thread Body
//! 1. Record the thread id, apply CPU affinity and scheduling.
//! 2. Reset the clock, run `init` once, wait for the first tick and reset
//!    the clock again.
//! 3. Each cycle: lock the mutex with the next wake-up as timeout, call the
//!    loop callback if running, then sleep until the next tick.
//! 4. A missed tick is fatal for the executor: `emergency_exit` runs once and
//!    the thread ends. A normal stop runs `end` once.
//!
//! OS failures inside the thread abort the process.
//!
//! Callbacks must not call back into their own executor: the mutex is not
//! reentrant.

use std::os::unix::thread::JoinHandleExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use nix::unistd::{Pid, gettid};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::clock::CycleClock;
use crate::cpu::{CpuAffinity, set_thread_affinity};
use crate::error::RtError;
use crate::memory::prefault_stack;
use crate::sched::{SchedAttr, SchedPolicy, log_thread_attrs, set_thread_sched};

/// Stack size of executor threads. Leaves room for [`prefault_stack`].
pub const THREAD_STACK_SIZE: usize = 4 * 1024 * 1024;

/// Lifecycle callback.
pub type Callback = Box<dyn FnMut() + Send + 'static>;

/// How a missed tick is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DeadlineMode {
    /// Enforce only for real-time policies.
    #[default]
    Auto = 0,
    /// Always enforce.
    Enforce = 1,
    /// Never enforce.
    Ignore = 2,
}

impl DeadlineMode {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Enforce,
            2 => Self::Ignore,
            _ => Self::Auto,
        }
    }

    /// Whether a missed tick terminates the executor under `policy`.
    pub const fn enforced(&self, policy: SchedPolicy) -> bool {
        match self {
            Self::Auto => policy.is_realtime(),
            Self::Enforce => true,
            Self::Ignore => false,
        }
    }
}

// ─── Shared State ───────────────────────────────────────────────────

struct Inner {
    cpus: CpuAffinity,
    sched: SchedAttr,
    init: Option<Callback>,
    cycle: Option<Callback>,
    end: Option<Callback>,
    emergency_exit: Option<Callback>,
}

struct Shared {
    name: String,
    inner: Mutex<Inner>,
    active: AtomicBool,
    running: AtomicBool,
    stop_requested: AtomicBool,
    deadline_missed: AtomicBool,
    deadline_mode: AtomicU8,
    /// Mirror of `inner.sched.policy()`, readable without the mutex.
    policy: AtomicU8,
    /// OS thread id, 0 while no thread runs.
    tid: AtomicI32,
}

impl Shared {
    fn enforce_deadline(&self) -> bool {
        let policy = SchedPolicy::from_u8(self.policy.load(Ordering::Acquire));
        DeadlineMode::from_u8(self.deadline_mode.load(Ordering::Acquire)).enforced(policy)
    }

    fn live_tid(&self) -> Option<Pid> {
        match self.tid.load(Ordering::Acquire) {
            0 => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }
}

// ─── Executor ───────────────────────────────────────────────────────

/// Fixed-period real-time thread with init/loop/end/emergency callbacks.
pub struct CyclicExecutor {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    period_ns: u64,
}

impl CyclicExecutor {
    /// Idle executor on all cores with the default time-sharing policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_attrs(name, CpuAffinity::all(), SchedAttr::default())
    }

    pub fn with_attrs(name: impl Into<String>, cpus: CpuAffinity, sched: SchedAttr) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                inner: Mutex::new(Inner {
                    cpus,
                    sched,
                    init: None,
                    cycle: None,
                    end: None,
                    emergency_exit: None,
                }),
                active: AtomicBool::new(false),
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                deadline_missed: AtomicBool::new(false),
                deadline_mode: AtomicU8::new(DeadlineMode::Auto as u8),
                policy: AtomicU8::new(sched.policy() as u8),
                tid: AtomicI32::new(0),
            }),
            handle: None,
            period_ns: 0,
        }
    }

    // ── Configuration ──

    /// Set CPU affinity and scheduling in one call.
    pub fn configure(&self, cpus: CpuAffinity, sched: SchedAttr) -> Result<(), RtError> {
        self.set_cpus(cpus)?;
        self.set_sched_attr(sched)
    }

    /// Set the CPU affinity, applied to the live thread when active.
    pub fn set_cpus(&self, cpus: CpuAffinity) -> Result<(), RtError> {
        let mut inner = self.shared.inner.lock();
        if let Some(tid) = self.live_tid() {
            set_thread_affinity(&self.shared.name, tid, &cpus)?;
            info!("[{}] affinity changed to {cpus}", self.shared.name);
        }
        inner.cpus = cpus;
        Ok(())
    }

    /// Set the scheduling attributes, applied to the live thread when active.
    pub fn set_sched_attr(&self, sched: SchedAttr) -> Result<(), RtError> {
        let mut inner = self.shared.inner.lock();
        if let Some(tid) = self.live_tid() {
            set_thread_sched(&self.shared.name, tid, sched)?;
            info!("[{}] scheduling changed to {sched}", self.shared.name);
        }
        inner.sched = sched;
        self.shared
            .policy
            .store(sched.policy() as u8, Ordering::Release);
        Ok(())
    }

    /// Override how missed ticks are judged.
    pub fn set_deadline_mode(&self, mode: DeadlineMode) {
        self.shared.deadline_mode.store(mode as u8, Ordering::Release);
    }

    pub fn deadline_mode(&self) -> DeadlineMode {
        DeadlineMode::from_u8(self.shared.deadline_mode.load(Ordering::Acquire))
    }

    // ── Callbacks ──

    /// Called once on the executor thread before the first cycle.
    pub fn set_init<F: FnMut() + Send + 'static>(&self, f: F) {
        self.warn_if_active("init");
        self.shared.inner.lock().init = Some(Box::new(f));
    }

    /// Called once per cycle. Cannot be replaced while active.
    pub fn set_loop<F: FnMut() + Send + 'static>(&self, f: F) -> Result<(), RtError> {
        if self.is_active() {
            warn!("[{}] loop callback cannot change while active", self.shared.name);
            return Err(RtError::AlreadyActive {
                name: self.shared.name.clone(),
            });
        }
        self.shared.inner.lock().cycle = Some(Box::new(f));
        Ok(())
    }

    /// Called once after a normal stop.
    pub fn set_end<F: FnMut() + Send + 'static>(&self, f: F) {
        self.warn_if_active("end");
        self.shared.inner.lock().end = Some(Box::new(f));
    }

    /// Called once when a tick is missed, before the thread terminates.
    pub fn set_emergency_exit<F: FnMut() + Send + 'static>(&self, f: F) {
        self.warn_if_active("emergency exit");
        self.shared.inner.lock().emergency_exit = Some(Box::new(f));
    }

    fn warn_if_active(&self, which: &str) {
        if self.is_active() {
            warn!(
                "[{}] {which} callback replaced while active, takes effect on next use",
                self.shared.name
            );
        }
    }

    // ── Lifecycle ──

    /// Spawn the cyclic thread with the given period.
    pub fn start(&mut self, period_ns: u64) -> Result<(), RtError> {
        let name = self.shared.name.clone();
        if self.is_active() {
            return Err(RtError::AlreadyActive { name });
        }
        if period_ns == 0 {
            return Err(RtError::InvalidPeriod { name });
        }
        if self.shared.inner.lock().cycle.is_none() {
            return Err(RtError::MissingLoop { name });
        }
        // Reap a thread that ended on a missed deadline.
        self.join_thread();

        self.shared.stop_requested.store(false, Ordering::Release);
        self.shared.deadline_missed.store(false, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);
        self.shared.active.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(name.clone())
            .stack_size(THREAD_STACK_SIZE)
            .spawn(move || run(&shared, period_ns));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                self.period_ns = period_ns;
                info!("[{name}] started with period {period_ns} ns");
                Ok(())
            }
            Err(source) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.active.store(false, Ordering::Release);
                Err(RtError::Spawn { name, source })
            }
        }
    }

    /// Skip the loop callback until [`resume`](Self::resume). The clock keeps ticking.
    pub fn pause(&self) {
        let _guard = self.shared.inner.lock();
        self.shared.running.store(false, Ordering::Release);
    }

    /// Re-enable the loop callback from the next cycle on.
    pub fn resume(&self) {
        let _guard = self.shared.inner.lock();
        if self.shared.active.load(Ordering::Acquire) {
            self.shared.running.store(true, Ordering::Release);
        }
    }

    /// Request stop and join the thread. No-op when never started.
    ///
    /// The in-flight cycle completes first.
    pub fn stop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        self.shared.stop_requested.store(true, Ordering::Release);
        self.pause();
        self.join_thread();

        self.shared.active.store(false, Ordering::Release);
        self.shared.running.store(false, Ordering::Release);
        self.shared.stop_requested.store(false, Ordering::Release);
        self.shared.tid.store(0, Ordering::Release);
        info!("[{}] stopped", self.shared.name);
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[{}] cyclic thread panicked", self.shared.name);
            }
        }
    }

    // ── Accessors ──

    #[inline]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// True after the thread ended on a missed tick, until the next start.
    #[inline]
    pub fn deadline_missed(&self) -> bool {
        self.shared.deadline_missed.load(Ordering::Acquire)
    }

    /// OS thread id while the thread runs.
    pub fn thread_id(&self) -> Option<i32> {
        self.live_tid().map(Pid::as_raw)
    }

    /// pthread handle while the thread is active.
    pub fn os_handle(&self) -> Option<libc::pthread_t> {
        if !self.is_active() {
            return None;
        }
        self.handle.as_ref().map(|h| h.as_pthread_t())
    }

    pub fn cpus(&self) -> CpuAffinity {
        self.shared.inner.lock().cpus.clone()
    }

    pub fn sched_attr(&self) -> SchedAttr {
        self.shared.inner.lock().sched
    }

    /// Period of the last start, 0 if never started.
    #[inline]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    fn live_tid(&self) -> Option<Pid> {
        if self.is_active() {
            self.shared.live_tid()
        } else {
            None
        }
    }
}

impl Drop for CyclicExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CyclicExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CyclicExecutor")
            .field("name", &self.shared.name)
            .field("active", &self.is_active())
            .field("running", &self.is_running())
            .field("period_ns", &self.period_ns)
            .finish_non_exhaustive()
    }
}

// ─── Thread Body ────────────────────────────────────────────────────

/// Unwrap or log and abort: timing cannot be trusted after an OS failure.
fn fatal<T>(name: &str, result: Result<T, RtError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!("[{name}] FATAL: {e}");
            std::process::abort();
        }
    }
}

fn run(shared: &Shared, period_ns: u64) {
    let name = shared.name.as_str();
    let tid = gettid();
    shared.tid.store(tid.as_raw(), Ordering::Release);

    let mut clock = CycleClock::new(name, period_ns);
    {
        let mut inner = shared.inner.lock();
        fatal(name, set_thread_affinity(name, tid, &inner.cpus));
        fatal(name, set_thread_sched(name, tid, inner.sched));
        log_thread_attrs(name, tid);
        prefault_stack();

        fatal(name, clock.reset());
        if let Some(init) = inner.init.as_mut() {
            init();
        }
    }
    // A slow init is not a deadline miss: cycles count from after the
    // first tick.
    fatal(name, clock.wait_until_next());
    fatal(name, clock.reset());

    while !shared.stop_requested.load(Ordering::Acquire)
        && !shared.deadline_missed.load(Ordering::Acquire)
    {
        let deadline = clock.peek_next();
        let timeout = Duration::from_nanos(fatal(name, clock.remaining_until(&deadline)));

        if let Some(mut inner) = shared.inner.try_lock_for(timeout) {
            if shared.running.load(Ordering::Acquire) {
                if let Some(cycle) = inner.cycle.as_mut() {
                    cycle();
                }
            }
        }

        let on_time = fatal(name, clock.wait_until_next());
        if !on_time && shared.enforce_deadline() {
            shared.deadline_missed.store(true, Ordering::Release);
        }
    }

    if shared.deadline_missed.load(Ordering::Acquire) {
        error!("[{name}] deadline missed, running emergency exit");
        let mut inner = shared.inner.lock();
        if let Some(emergency_exit) = inner.emergency_exit.as_mut() {
            emergency_exit();
        }
        shared.running.store(false, Ordering::Release);
        shared.active.store(false, Ordering::Release);
        shared.tid.store(0, Ordering::Release);
        return;
    }

    if let Some(end) = shared.inner.lock().end.as_mut() {
        end();
    }
    info!("[{name}] cyclic thread finished");
}

// ─── Tests ──────────────────────────────────────────────────────────
