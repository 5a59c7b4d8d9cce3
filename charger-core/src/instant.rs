//! Monotonic time abstraction shared by every controller component.
//!
//! Firmware wraps Embassy's instant, the emulator uses `std::time::Instant`
//! (behind the `std` feature), and tests use a plain microsecond counter.

use core::ops::Add;
use core::time::Duration;

/// Trait implemented by monotonic instant wrappers used for deadlines and staleness.
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

#[cfg(feature = "std")]
impl MonotonicInstant for std::time::Instant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        std::time::Instant::saturating_duration_since(self, earlier)
    }
}
