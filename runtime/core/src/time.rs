//! Process-wide timing.
//!
//! Micro time is monotonic and anchored at the first observation (the
//! runtime touches it during initialisation, so in practice it counts from
//! startup). Kernel time is a single atomic accumulator summing per-launch
//! wall times across all devices; per-device counters exposed as a sum
//! would be a compatible future change behind the same symbol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

/// Anchor instant for [`Clock::micro_time`].
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Cumulative kernel execution time in microseconds.
static KERNEL_MICROS: AtomicU64 = AtomicU64::new(0);

/// Zero-sized facade for the global time counters.
pub struct Clock;

impl Clock {
    /// Monotonic wall-clock microseconds since the anchor instant.
    #[must_use]
    pub fn micro_time() -> u64 {
        u64::try_from(EPOCH.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Cumulative kernel execution microseconds across all devices.
    #[must_use]
    pub fn kernel_time() -> u64 {
        KERNEL_MICROS.load(Ordering::Acquire)
    }

    /// Adds one launch's observed wall time to the accumulator.
    pub fn add_kernel_micros(micros: u64) {
        KERNEL_MICROS.fetch_add(micros, Ordering::AcqRel);
    }

    /// Forces the anchor instant, so later observations count from here.
    pub(crate) fn anchor() {
        Lazy::force(&EPOCH);
    }
}
