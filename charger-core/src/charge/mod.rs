//! Hysteresis charge state machine.
//!
//! The controller starts in [`ChargeState::Charging`] with power enabled. A
//! status reading at or above the stop threshold pauses charging; a reading at
//! or below the resume threshold enables it again. Readings in between leave
//! the state alone. Heartbeats never reach this module.
//!
//! Resuming opens a settle window: readings that arrive before the deadline are
//! skipped so the phone has time to report the new charging state. The window
//! is a deadline compared against the caller's clock, never a sleep.
//!
//! The thresholds are taken as sent. When the stop threshold is not above the
//! resume threshold both rules can fire on the same reading, which is reported
//! as [`ChargeDecision::Bounced`].

use core::fmt;
use core::time::Duration;

use crate::config::DEFAULT_SETTLE_DELAY;
use crate::frame::StatusReading;
use crate::instant::MonotonicInstant;

/// Charging power switch.
pub trait PowerOutput {
    /// Drives the charging supply on or off.
    fn set_enabled(&mut self, enabled: bool);
}

/// Charge states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargeState {
    Charging,
    Paused,
}

impl ChargeState {
    /// Returns `true` when this state keeps the supply enabled.
    #[must_use]
    pub const fn power_enabled(self) -> bool {
        matches!(self, ChargeState::Charging)
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChargeState::Charging => f.write_str("charging"),
            ChargeState::Paused => f.write_str("paused"),
        }
    }
}

/// What a single reading did to the state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChargeDecision<I> {
    /// No threshold was crossed.
    Unchanged(ChargeState),
    /// Battery reached the stop threshold; power was disabled.
    Paused,
    /// Battery fell to the resume threshold; power was enabled.
    Resumed { settle_until: I },
    /// Both thresholds fired on one reading; power ends up enabled.
    Bounced { settle_until: I },
    /// The reading arrived inside the settle window and was skipped.
    Settling { until: I },
}

impl<I> ChargeDecision<I> {
    /// Returns `true` when the reading pushed the state to `Paused` at some point.
    #[must_use]
    pub const fn paused(&self) -> bool {
        matches!(self, ChargeDecision::Paused | ChargeDecision::Bounced { .. })
    }

    /// Returns `true` when the reading re-enabled charging.
    #[must_use]
    pub const fn resumed(&self) -> bool {
        matches!(
            self,
            ChargeDecision::Resumed { .. } | ChargeDecision::Bounced { .. }
        )
    }
}

/// Result of evaluating one status reading.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChargeOutcome<I> {
    pub decision: ChargeDecision<I>,
    /// Set when the phone reports no external power while we are charging.
    pub advisory: bool,
}

/// Two-state hysteresis controller driving the power output.
#[derive(Clone, Debug)]
pub struct ChargeController<I> {
    state: ChargeState,
    settle_until: Option<I>,
    settle_delay: Duration,
}

impl<I> ChargeController<I>
where
    I: MonotonicInstant,
{
    /// Creates a controller in the charging state with the given settle delay.
    #[must_use]
    pub const fn new(settle_delay: Duration) -> Self {
        Self {
            state: ChargeState::Charging,
            settle_until: None,
            settle_delay,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ChargeState {
        self.state
    }

    /// Deadline of the active settle window, if one was opened.
    #[must_use]
    pub const fn settle_deadline(&self) -> Option<I> {
        self.settle_until
    }

    /// Returns `true` while readings at `now` would be skipped.
    #[must_use]
    pub fn is_settling(&self, now: I) -> bool {
        self.settle_until.is_some_and(|until| now < until)
    }

    /// Returns `true` when the plug-in advisory applies for this flag.
    #[must_use]
    pub const fn plug_in_advisory(&self, plugged_in: bool) -> bool {
        !plugged_in && self.state.power_enabled()
    }

    /// Evaluates a status reading received at `now`, switching `power` on edges.
    pub fn evaluate<P>(
        &mut self,
        reading: &StatusReading,
        now: I,
        power: &mut P,
    ) -> ChargeOutcome<I>
    where
        P: PowerOutput + ?Sized,
    {
        if let Some(until) = self.settle_until {
            if now < until {
                return ChargeOutcome {
                    decision: ChargeDecision::Settling { until },
                    advisory: false,
                };
            }
            self.settle_until = None;
        }

        let mut paused = false;
        if self.state == ChargeState::Charging && reading.battery_pct >= reading.max_threshold {
            self.state = ChargeState::Paused;
            power.set_enabled(false);
            paused = true;
        }

        let mut resumed = None;
        if self.state == ChargeState::Paused && reading.battery_pct <= reading.min_threshold {
            self.state = ChargeState::Charging;
            power.set_enabled(true);
            let settle_until = now + self.settle_delay;
            self.settle_until = Some(settle_until);
            resumed = Some(settle_until);
        }

        let decision = match (paused, resumed) {
            (true, Some(settle_until)) => ChargeDecision::Bounced { settle_until },
            (false, Some(settle_until)) => ChargeDecision::Resumed { settle_until },
            (true, None) => ChargeDecision::Paused,
            (false, None) => ChargeDecision::Unchanged(self.state),
        };

        ChargeOutcome {
            decision,
            advisory: self.plug_in_advisory(reading.plugged_in),
        }
    }
}

impl<I> Default for ChargeController<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instant::mock::MicrosInstant;

    #[derive(Default)]
    struct RecordingPower {
        enabled: Option<bool>,
        writes: usize,
    }

    impl PowerOutput for RecordingPower {
        fn set_enabled(&mut self, enabled: bool) {
            self.enabled = Some(enabled);
            self.writes += 1;
        }
    }

    fn reading(battery_pct: u16, max: u16, min: u16) -> StatusReading {
        StatusReading::new(battery_pct, max, min, true)
    }

    fn ms(value: u64) -> MicrosInstant {
        MicrosInstant::from_millis(value)
    }

    #[test]
    fn pauses_at_stop_threshold_then_resumes_with_settle_window() {
        let mut controller = ChargeController::default();
        let mut power = RecordingPower::default();

        let outcome = controller.evaluate(&reading(95, 90, 20), ms(0), &mut power);
        assert_eq!(outcome.decision, ChargeDecision::Paused);
        assert_eq!(controller.state(), ChargeState::Paused);
        assert_eq!(power.enabled, Some(false));

        let outcome = controller.evaluate(&reading(15, 90, 20), ms(1_000), &mut power);
        assert_eq!(
            outcome.decision,
            ChargeDecision::Resumed {
                settle_until: ms(3_250)
            }
        );
        assert_eq!(controller.state(), ChargeState::Charging);
        assert_eq!(power.enabled, Some(true));
        assert!(controller.is_settling(ms(3_249)));
        assert!(!controller.is_settling(ms(3_250)));
    }

    #[test]
    fn readings_inside_settle_window_are_skipped() {
        let mut controller = ChargeController::new(Duration::from_millis(2_250));
        let mut power = RecordingPower::default();
        controller.evaluate(&reading(95, 90, 20), ms(0), &mut power);
        controller.evaluate(&reading(10, 90, 20), ms(100), &mut power);
        let writes = power.writes;

        let outcome = controller.evaluate(&reading(99, 90, 20), ms(2_000), &mut power);
        assert_eq!(
            outcome.decision,
            ChargeDecision::Settling { until: ms(2_350) }
        );
        assert_eq!(controller.state(), ChargeState::Charging);
        assert_eq!(power.writes, writes);

        let outcome = controller.evaluate(&reading(99, 90, 20), ms(2_350), &mut power);
        assert_eq!(outcome.decision, ChargeDecision::Paused);
        assert_eq!(controller.settle_deadline(), None);
    }

    #[test]
    fn between_thresholds_never_transitions() {
        for start_paused in [false, true] {
            let mut controller = ChargeController::new(Duration::ZERO);
            let mut power = RecordingPower::default();
            if start_paused {
                controller.evaluate(&reading(100, 90, 20), ms(0), &mut power);
            }
            let before = controller.state();
            let writes = power.writes;

            let outcome = controller.evaluate(&reading(50, 90, 20), ms(10), &mut power);
            assert_eq!(outcome.decision, ChargeDecision::Unchanged(before));
            assert_eq!(controller.state(), before);
            assert_eq!(power.writes, writes);
        }
    }

    #[test]
    fn boundary_values_are_inclusive() {
        let mut controller = ChargeController::new(Duration::ZERO);
        let mut power = RecordingPower::default();

        let outcome = controller.evaluate(&reading(90, 90, 20), ms(0), &mut power);
        assert!(outcome.decision.paused());

        let outcome = controller.evaluate(&reading(20, 90, 20), ms(1), &mut power);
        assert!(outcome.decision.resumed());
    }

    #[test]
    fn inverted_thresholds_bounce_within_one_reading() {
        let mut controller = ChargeController::new(Duration::from_millis(500));
        let mut power = RecordingPower::default();

        let outcome = controller.evaluate(&reading(50, 40, 60), ms(0), &mut power);
        assert_eq!(
            outcome.decision,
            ChargeDecision::Bounced {
                settle_until: ms(500)
            }
        );
        assert_eq!(controller.state(), ChargeState::Charging);
        assert_eq!(power.writes, 2);
        assert_eq!(power.enabled, Some(true));
    }

    #[test]
    fn advisory_only_while_charging_and_unplugged() {
        let mut controller = ChargeController::new(Duration::ZERO);
        let mut power = RecordingPower::default();

        let unplugged = StatusReading::new(50, 90, 20, false);
        let outcome = controller.evaluate(&unplugged, ms(0), &mut power);
        assert!(outcome.advisory);
        assert_eq!(power.writes, 0);

        let unplugged_full = StatusReading::new(95, 90, 20, false);
        let outcome = controller.evaluate(&unplugged_full, ms(1), &mut power);
        assert!(!outcome.advisory);
        assert!(!controller.plug_in_advisory(false));
    }
}
