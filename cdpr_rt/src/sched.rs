//! OS scheduling policy and priority of a thread.

use std::fmt;

use nix::errno::Errno;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cpu::thread_affinity;
use crate::error::RtError;

/// Lowest valid priority for the real-time policies.
pub const RT_PRIORITY_MIN: i32 = 1;
/// Highest valid priority for the real-time policies.
pub const RT_PRIORITY_MAX: i32 = 99;

/// Scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SchedPolicy {
    /// Default time-sharing policy, no timing guarantee.
    #[default]
    Other,
    /// Real-time first-in first-out.
    Fifo,
    /// Real-time round-robin.
    #[serde(rename = "rr")]
    RoundRobin,
}

impl SchedPolicy {
    /// Inverse of `as u8`; unknown values map to `Other`.
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fifo,
            2 => Self::RoundRobin,
            _ => Self::Other,
        }
    }

    #[inline]
    pub const fn is_realtime(&self) -> bool {
        matches!(self, Self::Fifo | Self::RoundRobin)
    }

    pub const fn as_libc(&self) -> libc::c_int {
        match self {
            Self::Other => libc::SCHED_OTHER,
            Self::Fifo => libc::SCHED_FIFO,
            Self::RoundRobin => libc::SCHED_RR,
        }
    }

    /// Map a raw policy. Batch and idle are reported as `Other`.
    pub const fn from_libc(raw: libc::c_int) -> Option<Self> {
        match raw {
            libc::SCHED_FIFO => Some(Self::Fifo),
            libc::SCHED_RR => Some(Self::RoundRobin),
            libc::SCHED_OTHER | libc::SCHED_BATCH | libc::SCHED_IDLE => Some(Self::Other),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Other => "SCHED_OTHER",
            Self::Fifo => "SCHED_FIFO",
            Self::RoundRobin => "SCHED_RR",
        }
    }

    /// Priority used when none is requested.
    #[inline]
    pub const fn default_priority(&self) -> i32 {
        if self.is_realtime() { RT_PRIORITY_MIN } else { 0 }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated policy + priority pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedAttr {
    policy: SchedPolicy,
    priority: i32,
}

impl SchedAttr {
    /// Validate a scheduling request.
    ///
    /// A missing priority takes the policy default. `Other` only accepts
    /// priority 0: any other request is coerced to 0 with a warning.
    pub fn new(policy: SchedPolicy, priority: Option<i32>) -> Result<Self, RtError> {
        let priority = match (policy, priority) {
            (_, None) => policy.default_priority(),
            (SchedPolicy::Other, Some(0)) => 0,
            (SchedPolicy::Other, Some(p)) => {
                warn!("priority {p} ignored for {policy}, using 0");
                0
            }
            (_, Some(p)) if (RT_PRIORITY_MIN..=RT_PRIORITY_MAX).contains(&p) => p,
            (_, Some(p)) => return Err(RtError::InvalidPriority { policy, priority: p }),
        };
        Ok(Self { policy, priority })
    }

    /// Real-time FIFO at `priority`.
    pub fn fifo(priority: i32) -> Result<Self, RtError> {
        Self::new(SchedPolicy::Fifo, Some(priority))
    }

    #[inline]
    pub const fn policy(&self) -> SchedPolicy {
        self.policy
    }

    #[inline]
    pub const fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Display for SchedAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.policy, self.priority)
    }
}

/// Apply `attr` to thread `tid`.
pub fn set_thread_sched(name: &str, tid: Pid, attr: SchedAttr) -> Result<(), RtError> {
    let param = libc::sched_param {
        sched_priority: attr.priority,
    };
    // SAFETY: `param` outlives the call; the kernel validates tid and values.
    let ret = unsafe { libc::sched_setscheduler(tid.as_raw(), attr.policy.as_libc(), &param) };
    if ret != 0 {
        return Err(RtError::os(name, "sched_setscheduler", Errno::last()));
    }
    Ok(())
}

/// Read back the policy and priority of thread `tid`.
pub fn thread_sched(name: &str, tid: Pid) -> Result<SchedAttr, RtError> {
    // SAFETY: plain syscalls on a pid value.
    let raw = unsafe { libc::sched_getscheduler(tid.as_raw()) };
    if raw < 0 {
        return Err(RtError::os(name, "sched_getscheduler", Errno::last()));
    }
    let mut param = libc::sched_param { sched_priority: 0 };
    // SAFETY: `param` is a valid out-pointer for the duration of the call.
    if unsafe { libc::sched_getparam(tid.as_raw(), &mut param) } != 0 {
        return Err(RtError::os(name, "sched_getparam", Errno::last()));
    }
    let policy = SchedPolicy::from_libc(raw)
        .ok_or_else(|| RtError::os(name, "sched_getscheduler", Errno::EINVAL))?;
    Ok(SchedAttr {
        policy,
        priority: param.sched_priority,
    })
}

/// Log affinity and scheduling of thread `tid` at debug level.
pub fn log_thread_attrs(name: &str, tid: Pid) {
    match (thread_affinity(name, tid), thread_sched(name, tid)) {
        (Ok(cpus), Ok(sched)) => {
            debug!("[{name}] tid {tid}: cpus {cpus}, {sched}");
        }
        (Err(e), _) | (_, Err(e)) => warn!("[{name}] cannot read thread attributes: {e}"),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
