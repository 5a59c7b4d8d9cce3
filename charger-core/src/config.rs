//! Timing and calibration knobs for the charge controller.
//!
//! Every value defaults to the figure the charger was tuned with on the bench;
//! firmware and the emulator start from [`ChargerConfig::new`] and override
//! individual fields when needed.

use core::time::Duration;

/// Longest wait for a complete telemetry frame once bytes start arriving.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2_000);
/// Delay between polling cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet period after re-enabling power before readings are evaluated again.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2_250);
/// Silence tolerated on a connected link before a staleness warning.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(300_000);
/// Parasitic load (status LED) subtracted from every current sample.
pub const DEFAULT_BASELINE_OFFSET_MA: u16 = 16;

/// Controller configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChargerConfig {
    pub read_timeout: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub stale_after: Duration,
    pub baseline_offset_ma: u16,
}

impl ChargerConfig {
    /// Creates a configuration populated with the default timings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            stale_after: DEFAULT_STALE_AFTER,
            baseline_offset_ma: DEFAULT_BASELINE_OFFSET_MA,
        }
    }

    /// Overrides the settle delay applied after charging resumes.
    #[must_use]
    pub const fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Overrides the heartbeat staleness window.
    #[must_use]
    pub const fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Overrides the frame read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Overrides the baseline current subtracted from each sample.
    #[must_use]
    pub const fn with_baseline_offset_ma(mut self, baseline_offset_ma: u16) -> Self {
        self.baseline_offset_ma = baseline_offset_ma;
        self
    }
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bench_tuning() {
        let config = ChargerConfig::default();
        assert_eq!(config.read_timeout, Duration::from_millis(2_000));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.settle_delay, Duration::from_millis(2_250));
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.baseline_offset_ma, 16);
    }

    #[test]
    fn builders_override_single_fields() {
        let config = ChargerConfig::new()
            .with_settle_delay(Duration::from_millis(10))
            .with_baseline_offset_ma(0);
        assert_eq!(config.settle_delay, Duration::from_millis(10));
        assert_eq!(config.baseline_offset_ma, 0);
        assert_eq!(config.stale_after, DEFAULT_STALE_AFTER);
    }
}
