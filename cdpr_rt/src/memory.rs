//! One-time process memory setup for real-time operation.
//!
//! Must run before any executor starts:
//! 1. `mlockall(MCL_CURRENT | MCL_FUTURE)`: lock all pages.
//! 2. `mallopt`: never trim the heap, never serve allocations with `mmap`.
//! 3. Reserve and touch heap pages so later allocations reuse resident memory.
//! 4. Prefault the calling thread's stack.
//!
//! Steps 1 and 2 only run with the `rt` feature.

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::RtError;

/// Stack bytes touched by [`prefault_stack`].
pub const STACK_PREFAULT_BYTES: usize = 1024 * 1024;

static INITIALIZED: Mutex<bool> = Mutex::new(false);

/// Lock and prefault process memory. Later calls are no-ops.
///
/// A failed attempt leaves the process uninitialized so the call can be
/// retried.
pub fn init_process_memory(reserve_bytes: usize) -> Result<(), RtError> {
    let mut initialized = INITIALIZED.lock();
    if *initialized {
        debug!("process memory already initialized");
        return Ok(());
    }

    lock_memory()?;
    configure_malloc()?;
    reserve_process_memory(reserve_bytes);
    prefault_stack();

    *initialized = true;
    info!("process memory initialized ({reserve_bytes} bytes reserved)");
    Ok(())
}

/// Whether [`init_process_memory`] has completed.
pub fn is_initialized() -> bool {
    *INITIALIZED.lock()
}

#[cfg(feature = "rt")]
fn lock_memory() -> Result<(), RtError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| RtError::os("process", "mlockall", e))
}

#[cfg(not(feature = "rt"))]
fn lock_memory() -> Result<(), RtError> {
    Ok(()) // No-op in simulation mode
}

#[cfg(all(feature = "rt", target_env = "gnu"))]
fn configure_malloc() -> Result<(), RtError> {
    // SAFETY: mallopt only tunes allocator parameters; returns 0 on failure.
    unsafe {
        if libc::mallopt(libc::M_TRIM_THRESHOLD, -1) == 0 {
            return Err(RtError::os("process", "mallopt(M_TRIM_THRESHOLD)", nix::errno::Errno::EINVAL));
        }
        if libc::mallopt(libc::M_MMAP_MAX, 0) == 0 {
            return Err(RtError::os("process", "mallopt(M_MMAP_MAX)", nix::errno::Errno::EINVAL));
        }
    }
    Ok(())
}

#[cfg(not(all(feature = "rt", target_env = "gnu")))]
fn configure_malloc() -> Result<(), RtError> {
    Ok(())
}

fn page_size() -> usize {
    // SAFETY: sysconf has no memory side effects.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size < 1 { 4096 } else { size as usize }
}

/// Allocate `bytes` of heap, write one byte per page, then release it to the
/// allocator (which keeps it when trimming is disabled).
fn reserve_process_memory(bytes: usize) {
    let mut buf: Vec<u8> = Vec::with_capacity(bytes);
    let page = page_size();
    for slot in buf.spare_capacity_mut().iter_mut().step_by(page) {
        // SAFETY: `slot` points into the allocation owned by `buf`.
        unsafe { core::ptr::write_volatile(slot.as_mut_ptr(), 0) };
    }
    core::hint::black_box(&buf);
}

/// Prefault stack pages to prevent page faults during RT execution.
pub fn prefault_stack() {
    let mut buf = [0u8; STACK_PREFAULT_BYTES];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xFF) };
    }
    core::hint::black_box(&buf);
}
