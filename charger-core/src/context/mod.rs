//! Owned controller state and the per-cycle step functions.
//!
//! [`ControllerContext`] bundles the charge controller, link monitor, and
//! current filter. Firmware drives the step functions from its async task so
//! that frame reads can await with a timeout; host tools and tests call
//! [`ControllerContext::run_cycle`], which performs one complete polling
//! iteration against blocking collaborators.
//!
//! One cycle:
//! 1. sample the link signal and report edges;
//! 2. when bytes are pending, read one frame and act on it, then drain
//!    whatever is left on the link;
//! 3. otherwise refresh the charge status while charging and check heartbeat
//!    staleness.

use core::time::Duration;

use crate::charge::{ChargeController, ChargeDecision, ChargeOutcome, ChargeState, PowerOutput};
use crate::config::ChargerConfig;
use crate::filter::{CurrentFilter, CurrentSensor, FILTER_CAPACITY};
use crate::frame::{self, DecodedReading, FRAME_LEN};
use crate::instant::MonotonicInstant;
use crate::link::{LinkEvent, LinkMonitor, LinkState};
use crate::telemetry::{StatusEvent, StatusSink};

/// Blocking byte source for the phone link.
pub trait RawLinkSource {
    /// Reads up to one frame into `buf`, waiting at most `timeout`; returns the byte count.
    fn read_frame(&mut self, buf: &mut [u8; FRAME_LEN], timeout: Duration) -> usize;

    /// Returns `true` when unread bytes are pending.
    fn bytes_available(&mut self) -> bool;

    /// Pops one pending byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Samples the link-connected signal.
    fn is_link_up(&mut self) -> bool;
}

/// What happened to a frame handed to [`ControllerContext::on_frame`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameDisposition<I> {
    Heartbeat,
    Reading(ChargeOutcome<I>),
    Discarded { received: usize },
}

/// Summary of one [`ControllerContext::run_cycle`] iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CycleReport<I> {
    pub link: LinkState,
    pub frame: Option<FrameDisposition<I>>,
    pub drained: usize,
}

/// All controller state, owned by the polling task.
pub struct ControllerContext<I, const N: usize = FILTER_CAPACITY> {
    config: ChargerConfig,
    charge: ChargeController<I>,
    link: LinkMonitor<I>,
    filter: CurrentFilter<N>,
}

impl<I, const N: usize> ControllerContext<I, N>
where
    I: MonotonicInstant,
{
    /// Creates a context in its startup state: charging, disconnected, filter zeroed.
    #[must_use]
    pub const fn new(config: ChargerConfig) -> Self {
        Self {
            charge: ChargeController::new(config.settle_delay),
            link: LinkMonitor::new(config.stale_after),
            filter: CurrentFilter::new(config.baseline_offset_ma),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ChargerConfig {
        &self.config
    }

    #[must_use]
    pub const fn charge(&self) -> &ChargeController<I> {
        &self.charge
    }

    #[must_use]
    pub const fn link(&self) -> &LinkMonitor<I> {
        &self.link
    }

    #[must_use]
    pub const fn filter(&self) -> &CurrentFilter<N> {
        &self.filter
    }

    /// Samples the link signal and reports connect/disconnect edges.
    pub fn on_link_signal<S>(&mut self, link_up: bool, now: I, sink: &mut S) -> LinkState
    where
        S: StatusSink<I> + ?Sized,
    {
        match self.link.poll_signal(link_up, now) {
            Some(LinkEvent::Connected) => sink.emit(StatusEvent::Connected, now),
            Some(LinkEvent::Disconnected) => sink.emit(StatusEvent::Disconnected, now),
            Some(LinkEvent::StaleHeartbeat { .. }) | None => {}
        }
        self.link.state()
    }

    /// Handles the bytes of one frame read.
    ///
    /// Short reads are reported and otherwise ignored. Heartbeats and readings
    /// both count as liveness; readings also run through the charge controller.
    pub fn on_frame<P, S, C>(
        &mut self,
        raw: &[u8],
        now: I,
        power: &mut P,
        sensor: &mut C,
        sink: &mut S,
    ) -> FrameDisposition<I>
    where
        P: PowerOutput + ?Sized,
        C: CurrentSensor + ?Sized,
        S: StatusSink<I> + ?Sized,
    {
        let decoded = match frame::decode_frame(raw) {
            Ok(decoded) => decoded,
            Err(frame::FrameError::ShortRead { received }) => {
                sink.emit(StatusEvent::FrameDiscarded { received }, now);
                return FrameDisposition::Discarded { received };
            }
        };

        let disposition = match decoded.reading {
            DecodedReading::Heartbeat => {
                sink.emit(
                    StatusEvent::HeartbeatReceived {
                        sent_at: decoded.timestamp,
                    },
                    now,
                );
                if self.charge.plug_in_advisory(decoded.plugged_in) {
                    sink.emit(StatusEvent::PlugInAdvisory, now);
                }
                FrameDisposition::Heartbeat
            }
            DecodedReading::StatusReading(reading) => {
                sink.emit(
                    StatusEvent::ReadingReceived {
                        reading,
                        sent_at: decoded.timestamp,
                    },
                    now,
                );

                let outcome = self.charge.evaluate(&reading, now, power);
                let battery_pct = reading.battery_pct;
                if outcome.decision.paused() {
                    sink.emit(StatusEvent::ChargingPaused { battery_pct }, now);
                }
                if outcome.decision.resumed() {
                    sink.emit(StatusEvent::ChargingResumed { battery_pct }, now);
                }
                // A resume samples current only after the settle window.
                if matches!(
                    outcome.decision,
                    ChargeDecision::Unchanged(_) | ChargeDecision::Paused
                ) {
                    self.emit_charge_status(now, sensor, sink);
                }
                if outcome.advisory {
                    sink.emit(StatusEvent::PlugInAdvisory, now);
                }
                FrameDisposition::Reading(outcome)
            }
        };

        self.link.note_liveness(now);
        disposition
    }

    /// Idle-cycle housekeeping: display refresh while charging, then staleness check.
    pub fn on_idle<C, S>(&mut self, now: I, sensor: &mut C, sink: &mut S)
    where
        C: CurrentSensor + ?Sized,
        S: StatusSink<I> + ?Sized,
    {
        if self.link.state() != LinkState::Connected {
            return;
        }

        if self.charge.state() == ChargeState::Charging {
            self.emit_charge_status(now, sensor, sink);
        }

        if let Some(LinkEvent::StaleHeartbeat { silent_for }) = self.link.check_stale(now) {
            sink.emit(StatusEvent::StaleHeartbeatWarning { silent_for }, now);
        }
    }

    /// Runs one complete polling iteration against blocking collaborators.
    ///
    /// `clock` is read once per step so events carry the instant they were
    /// produced at. The caller sleeps for `config().poll_interval` between calls.
    pub fn run_cycle<L, C, P, S, T>(
        &mut self,
        source: &mut L,
        sensor: &mut C,
        power: &mut P,
        sink: &mut S,
        clock: &mut T,
    ) -> CycleReport<I>
    where
        L: RawLinkSource + ?Sized,
        C: CurrentSensor + ?Sized,
        P: PowerOutput + ?Sized,
        S: StatusSink<I> + ?Sized,
        T: FnMut() -> I + ?Sized,
    {
        let link_up = source.is_link_up();
        let link = self.on_link_signal(link_up, clock(), sink);

        if link != LinkState::Connected {
            return CycleReport {
                link,
                frame: None,
                drained: 0,
            };
        }

        if !source.bytes_available() {
            self.on_idle(clock(), sensor, sink);
            return CycleReport {
                link,
                frame: None,
                drained: 0,
            };
        }

        let mut buf = [0u8; FRAME_LEN];
        let received = source
            .read_frame(&mut buf, self.config.read_timeout)
            .min(FRAME_LEN);
        let disposition = self.on_frame(&buf[..received], clock(), power, sensor, sink);

        let mut drained = 0;
        while source.bytes_available() {
            if source.read_byte().is_none() {
                break;
            }
            drained += 1;
        }
        report_drained(drained, clock(), sink);

        CycleReport {
            link,
            frame: Some(disposition),
            drained,
        }
    }

    fn emit_charge_status<C, S>(&mut self, now: I, sensor: &mut C, sink: &mut S)
    where
        C: CurrentSensor + ?Sized,
        S: StatusSink<I> + ?Sized,
    {
        let state = self.charge.state();
        let current_ma = match state {
            ChargeState::Charging => Some(self.filter.sample(sensor)),
            ChargeState::Paused => None,
        };
        sink.emit(StatusEvent::ChargeStatus { state, current_ma }, now);
    }
}

/// Reports how many residual bytes were discarded after a frame read.
pub fn report_drained<I, S>(count: usize, now: I, sink: &mut S)
where
    S: StatusSink<I> + ?Sized,
{
    if count > 0 {
        sink.emit(StatusEvent::BytesDrained { count }, now);
    }
}

impl<I, const N: usize> Default for ControllerContext<I, N>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new(ChargerConfig::new())
    }
}
