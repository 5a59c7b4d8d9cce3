//! Embassy-backed instant used by every firmware component.
//!
//! `charger-core` only needs [`MonotonicInstant`]; the newtype bridges Embassy's
//! tick-based `Instant` and `core::time::Duration` deadlines.

use core::ops::Add;
use core::time::Duration;

use charger_core::instant::MonotonicInstant;
use embassy_time::{Duration as EmbassyDuration, Instant as EmbassyInstant};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(EmbassyInstant);

impl FirmwareInstant {
    /// Reads the Embassy time driver.
    #[cfg(target_os = "none")]
    #[must_use]
    pub fn now() -> Self {
        Self(EmbassyInstant::now())
    }

    #[must_use]
    pub const fn into_embassy(self) -> EmbassyInstant {
        self.0
    }

    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<EmbassyInstant> for FirmwareInstant {
    fn from(value: EmbassyInstant) -> Self {
        Self(value)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(
            self.0
                .checked_add(EmbassyDuration::from_micros(micros))
                .unwrap_or(EmbassyInstant::MAX),
        )
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = self.0.saturating_duration_since(earlier.0);
        Duration::from_micros(elapsed.as_micros())
    }
}

/// Converts a core duration into an Embassy duration for timers and timeouts.
#[must_use]
pub fn to_embassy(duration: Duration) -> EmbassyDuration {
    EmbassyDuration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}
