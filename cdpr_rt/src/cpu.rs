//! CPU affinity sets.

use std::fmt;

use nix::sched::{CpuSet, sched_getaffinity, sched_setaffinity};
use nix::unistd::Pid;

use crate::error::RtError;

/// Index meaning "last available core" in a requested CPU list.
pub const LAST_CORE: isize = -1;

/// Number of online logical CPUs.
pub fn cpu_cores_count() -> usize {
    // SAFETY: sysconf has no memory side effects.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 { 1 } else { n as usize }
}

/// Sorted, duplicate-free set of core indices a thread may run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuAffinity {
    cores: Vec<usize>,
}

impl CpuAffinity {
    /// Every online core.
    pub fn all() -> Self {
        Self {
            cores: (0..cpu_cores_count()).collect(),
        }
    }

    /// Only the last online core.
    pub fn last() -> Self {
        Self {
            cores: vec![cpu_cores_count() - 1],
        }
    }

    /// A single core.
    pub fn single(cpu: isize) -> Result<Self, RtError> {
        Self::from_cores(&[cpu])
    }

    /// Build a set from requested indices.
    ///
    /// [`LAST_CORE`] resolves to the last online core, duplicates collapse and
    /// an empty request means every core.
    pub fn from_cores(requested: &[isize]) -> Result<Self, RtError> {
        let available = cpu_cores_count();
        if requested.is_empty() {
            return Ok(Self::all());
        }
        if requested.len() > available {
            return Err(RtError::TooManyCpus {
                requested: requested.len(),
                available,
            });
        }

        let mut cores = Vec::with_capacity(requested.len());
        for &cpu in requested {
            let index = match cpu {
                LAST_CORE => available - 1,
                c if c < 0 || c as usize >= available => {
                    return Err(RtError::InvalidCpu { cpu, available });
                }
                c => c as usize,
            };
            cores.push(index);
        }
        cores.sort_unstable();
        cores.dedup();
        Ok(Self { cores })
    }

    #[inline]
    pub fn cores(&self) -> &[usize] {
        &self.cores
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    #[inline]
    pub fn contains(&self, cpu: usize) -> bool {
        self.cores.binary_search(&cpu).is_ok()
    }

    fn to_cpu_set(&self) -> Result<CpuSet, RtError> {
        let mut set = CpuSet::new();
        for &cpu in &self.cores {
            set.set(cpu).map_err(|_| RtError::InvalidCpu {
                cpu: cpu as isize,
                available: CpuSet::count(),
            })?;
        }
        Ok(set)
    }
}

impl Default for CpuAffinity {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for CpuAffinity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, cpu) in self.cores.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{cpu}")?;
        }
        f.write_str("]")
    }
}

/// Pin thread `tid` to `cpus`. `name` labels the error.
pub fn set_thread_affinity(name: &str, tid: Pid, cpus: &CpuAffinity) -> Result<(), RtError> {
    let set = cpus.to_cpu_set()?;
    sched_setaffinity(tid, &set).map_err(|e| RtError::os(name, "sched_setaffinity", e))
}

/// Current affinity of thread `tid`, restricted to online cores.
pub fn thread_affinity(name: &str, tid: Pid) -> Result<CpuAffinity, RtError> {
    let set = sched_getaffinity(tid).map_err(|e| RtError::os(name, "sched_getaffinity", e))?;
    let cores = (0..cpu_cores_count())
        .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
        .collect();
    Ok(CpuAffinity { cores })
}

// ─── Tests ──────────────────────────────────────────────────────────
