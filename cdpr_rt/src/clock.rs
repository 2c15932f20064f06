//! Absolute-time cycle clock on `CLOCK_MONOTONIC`.
//!
//! The clock holds the absolute time of the next wake-up and advances it by
//! whole periods, so pacing never drifts with the duration of the work done
//! inside a cycle. Sleeping uses `clock_nanosleep(TIMER_ABSTIME)`.

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

use cdpr_common::consts::NANOS_PER_SEC;

use crate::error::RtError;

const CLOCK: ClockId = ClockId::CLOCK_MONOTONIC;

// ─── Cycle Clock ────────────────────────────────────────────────────

/// Deterministic wake-up time generator with a fixed period.
#[derive(Debug, Clone)]
pub struct CycleClock {
    name: String,
    period_ns: u64,
    next_wake: TimeSpec,
}

impl CycleClock {
    /// Create a clock. `next_wake` stays at zero until [`reset`](Self::reset).
    pub fn new(name: impl Into<String>, period_ns: u64) -> Self {
        Self {
            name: name.into(),
            period_ns,
            next_wake: TimeSpec::new(0, 0),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Absolute time of the pending wake-up.
    #[inline]
    pub fn next_wake(&self) -> TimeSpec {
        self.next_wake
    }

    /// Set the pending wake-up to the current monotonic time.
    pub fn reset(&mut self) -> Result<(), RtError> {
        self.next_wake = self.now()?;
        Ok(())
    }

    /// Advance the pending wake-up by exactly one period.
    ///
    /// Every call skips one tick; call it once per cycle.
    #[inline]
    pub fn next(&mut self) {
        self.next_wake = advance(self.next_wake, self.period_ns);
    }

    /// Advance by one period and return the new wake-up time.
    #[inline]
    pub fn next_time(&mut self) -> TimeSpec {
        self.next();
        self.next_wake
    }

    /// Wake-up time one period after the pending one, without advancing.
    #[inline]
    pub fn peek_next(&self) -> TimeSpec {
        advance(self.next_wake, self.period_ns)
    }

    /// Seconds elapsed since the pending wake-up; positive once it has passed.
    pub fn elapsed(&self) -> Result<f64, RtError> {
        let now = self.now()?;
        Ok(nanosec_to_sec(timespec_diff_ns(&now, &self.next_wake)))
    }

    /// Nanoseconds left until `deadline`, clamped at zero.
    pub fn remaining_until(&self, deadline: &TimeSpec) -> Result<u64, RtError> {
        let now = self.now()?;
        Ok(timespec_diff_ns(deadline, &now).max(0) as u64)
    }

    /// Advance one period and sleep until it.
    ///
    /// Returns `false` without sleeping when the new wake-up time has already
    /// passed (the tick was missed). Interrupted sleeps are resumed.
    pub fn wait_until_next(&mut self) -> Result<bool, RtError> {
        self.next();
        if self.elapsed()? > 0.0 {
            return Ok(false);
        }
        loop {
            match clock_nanosleep(CLOCK, ClockNanosleepFlags::TIMER_ABSTIME, &self.next_wake) {
                Ok(_) => return Ok(true),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(RtError::os(&self.name, "clock_nanosleep", e)),
            }
        }
    }

    fn now(&self) -> Result<TimeSpec, RtError> {
        clock_gettime(CLOCK).map_err(|e| RtError::os(&self.name, "clock_gettime", e))
    }
}

// ─── Time Helpers ───────────────────────────────────────────────────

/// `ts` advanced by `period_ns`, nanoseconds normalized below one second.
#[inline]
pub fn advance(ts: TimeSpec, period_ns: u64) -> TimeSpec {
    timespec_add_ns(ts, period_ns as i64)
}

/// Add (possibly negative) nanoseconds to a TimeSpec.
#[inline]
pub fn timespec_add_ns(ts: TimeSpec, ns: i64) -> TimeSpec {
    let total = ts.tv_nsec() as i64 + ns;
    let secs = ts.tv_sec() as i64 + total.div_euclid(NANOS_PER_SEC);
    let nanos = total.rem_euclid(NANOS_PER_SEC);
    TimeSpec::new(secs as libc::time_t, nanos as _)
}

/// Compute the difference (a - b) in nanoseconds.
#[inline]
pub fn timespec_diff_ns(a: &TimeSpec, b: &TimeSpec) -> i64 {
    (a.tv_sec() as i64 - b.tv_sec() as i64) * NANOS_PER_SEC
        + (a.tv_nsec() as i64 - b.tv_nsec() as i64)
}

/// Seconds to nanoseconds, rounded. Negative input gives zero.
#[inline]
pub fn sec_to_nanosec(sec: f64) -> u64 {
    (sec * NANOS_PER_SEC as f64).round().max(0.0) as u64
}

#[inline]
pub fn nanosec_to_sec(ns: i64) -> f64 {
    ns as f64 / NANOS_PER_SEC as f64
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn advance_carries_into_seconds() {
        let ts = TimeSpec::new(10, 999_999_500);
        let next = advance(ts, 1_000);
        assert_eq!(next.tv_sec(), 11);
        assert_eq!(next.tv_nsec(), 500);

        let long = advance(TimeSpec::new(0, 0), 2_500_000_000);
        assert_eq!(long.tv_sec(), 2);
        assert_eq!(long.tv_nsec(), 500_000_000);
    }

    #[test]
    fn negative_offsets_borrow_from_seconds() {
        let ts = timespec_add_ns(TimeSpec::new(5, 100), -200);
        assert_eq!(ts.tv_sec(), 4);
        assert_eq!(ts.tv_nsec(), 999_999_900);
    }

    #[test]
    fn conversions() {
        assert_eq!(sec_to_nanosec(0.001), 1_000_000);
        assert_eq!(sec_to_nanosec(1.5), 1_500_000_000);
        assert_eq!(sec_to_nanosec(-1.0), 0);
        assert!((nanosec_to_sec(250_000_000) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut clock = CycleClock::new("peek", 1_000_000);
        clock.reset().unwrap();
        let before = clock.next_wake();
        let peeked = clock.peek_next();
        assert_eq!(clock.next_wake(), before);
        assert_eq!(clock.next_time(), peeked);
    }

    #[test]
    fn next_twice_skips_a_tick() {
        let mut clock = CycleClock::new("skip", 1_000);
        clock.reset().unwrap();
        let start = clock.next_wake();
        clock.next();
        clock.next();
        assert_eq!(timespec_diff_ns(&clock.next_wake(), &start), 2_000);
    }

    #[test]
    fn wait_until_next_sleeps_when_on_time() {
        let mut clock = CycleClock::new("sleep", 2_000_000);
        clock.reset().unwrap();
        assert!(clock.wait_until_next().unwrap());
        assert!(clock.elapsed().unwrap() >= 0.0);
    }

    #[test]
    fn wait_until_next_reports_missed_tick_without_sleeping() {
        let mut clock = CycleClock::new("late", 1_000_000);
        clock.reset().unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let started = std::time::Instant::now();
        assert!(!clock.wait_until_next().unwrap());
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(clock.elapsed().unwrap() > 0.0);
    }

    #[test]
    fn remaining_until_is_clamped() {
        let mut clock = CycleClock::new("remaining", 1_000_000);
        clock.reset().unwrap();
        let past = timespec_add_ns(clock.next_wake(), -1_000_000);
        assert_eq!(clock.remaining_until(&past).unwrap(), 0);
        let future = timespec_add_ns(clock.next_wake(), 50_000_000);
        assert!(clock.remaining_until(&future).unwrap() > 0);
    }

    proptest! {
        #[test]
        fn ticks_are_spaced_by_exactly_one_period(
            sec in 0i64..1_000_000,
            nsec in 0i64..NANOS_PER_SEC,
            period in 1u64..3_000_000_000,
            ticks in 1usize..64,
        ) {
            let mut ts = TimeSpec::new(sec as libc::time_t, nsec as _);
            for _ in 0..ticks {
                let next = advance(ts, period);
                prop_assert!(next.tv_nsec() >= 0);
                prop_assert!((next.tv_nsec() as i64) < NANOS_PER_SEC);
                prop_assert_eq!(timespec_diff_ns(&next, &ts), period as i64);
                prop_assert!(next > ts);
                ts = next;
            }
        }
    }
}
