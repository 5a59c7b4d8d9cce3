use core::ops::Add;
use core::time::Duration;
use std::collections::VecDeque;

use charger_core::charge::{ChargeDecision, ChargeState, PowerOutput};
use charger_core::config::ChargerConfig;
use charger_core::context::{ControllerContext, FrameDisposition, RawLinkSource};
use charger_core::frame::FRAME_LEN;
use charger_core::instant::MonotonicInstant;
use charger_core::link::LinkState;
use charger_core::telemetry::{StatusEvent, StatusRecorder};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
struct TestInstant(u64);

impl Add<Duration> for TestInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_millis()).unwrap())
    }
}

impl MonotonicInstant for TestInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Default)]
struct ScriptedLink {
    up: bool,
    pending: VecDeque<u8>,
}

impl ScriptedLink {
    fn send(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes.iter().copied());
    }
}

impl RawLinkSource for ScriptedLink {
    fn read_frame(&mut self, buf: &mut [u8; FRAME_LEN], _timeout: Duration) -> usize {
        let mut count = 0;
        while count < FRAME_LEN {
            match self.pending.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    fn bytes_available(&mut self) -> bool {
        !self.pending.is_empty()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.pending.pop_front()
    }

    fn is_link_up(&mut self) -> bool {
        self.up
    }
}

#[derive(Default)]
struct Power {
    enabled: bool,
    toggles: usize,
}

impl PowerOutput for Power {
    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.toggles += 1;
    }
}

struct Rig {
    context: ControllerContext<TestInstant>,
    link: ScriptedLink,
    power: Power,
    recorder: StatusRecorder<TestInstant, 256>,
    now: TestInstant,
    raw_current_ma: u16,
}

impl Rig {
    fn new(config: ChargerConfig) -> Self {
        Self {
            context: ControllerContext::new(config),
            link: ScriptedLink::default(),
            power: Power {
                enabled: true,
                toggles: 0,
            },
            recorder: StatusRecorder::new(),
            now: TestInstant(0),
            raw_current_ma: 0,
        }
    }

    fn cycle(&mut self) -> charger_core::context::CycleReport<TestInstant> {
        let now = self.now;
        let raw = self.raw_current_ma;
        let mut sensor = move || raw;
        let mut clock = move || now;
        let report = self.context.run_cycle(
            &mut self.link,
            &mut sensor,
            &mut self.power,
            &mut self.recorder,
            &mut clock,
        );
        self.now = self.now + self.context.config().poll_interval;
        report
    }

    fn advance(&mut self, by: Duration) {
        self.now = self.now + by;
    }

    fn events(&self) -> Vec<StatusEvent> {
        self.recorder
            .oldest_first()
            .map(|record| record.event)
            .collect()
    }

    fn clear(&mut self) {
        self.recorder.clear();
    }
}

fn status_frame(battery: u16, max: u16, min: u16, plugged: bool) -> Vec<u8> {
    let text = format!(
        "12:00:00{battery:03}{max:03}{min:03}{}",
        if plugged { '1' } else { '0' }
    );
    assert_eq!(text.len(), FRAME_LEN);
    text.into_bytes()
}

#[test]
fn disconnected_link_reads_nothing() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.send(&status_frame(95, 90, 20, true));

    let report = rig.cycle();
    assert_eq!(report.link, LinkState::Disconnected);
    assert_eq!(report.frame, None);
    assert!(rig.events().is_empty());
    assert!(rig.link.bytes_available());
}

#[test]
fn full_charge_cycle_with_settle_window() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.raw_current_ma = 516;

    rig.cycle();
    assert_eq!(rig.events()[0], StatusEvent::Connected);

    rig.link.send(&status_frame(95, 90, 20, true));
    let report = rig.cycle();
    assert!(matches!(
        report.frame,
        Some(FrameDisposition::Reading(outcome)) if outcome.decision == ChargeDecision::Paused
    ));
    assert_eq!(rig.context.charge().state(), ChargeState::Paused);
    assert!(!rig.power.enabled);

    rig.link.send(&status_frame(15, 90, 20, true));
    let resumed_at = rig.now;
    let report = rig.cycle();
    assert!(matches!(
        report.frame,
        Some(FrameDisposition::Reading(outcome))
            if outcome.decision == ChargeDecision::Resumed {
                settle_until: resumed_at + Duration::from_millis(2_250)
            }
    ));
    assert!(rig.power.enabled);

    // Still inside the settle window: a full battery must not pause again.
    rig.advance(Duration::from_millis(1_000));
    rig.link.send(&status_frame(99, 90, 20, true));
    let report = rig.cycle();
    assert!(matches!(
        report.frame,
        Some(FrameDisposition::Reading(outcome))
            if matches!(outcome.decision, ChargeDecision::Settling { .. })
    ));
    assert_eq!(rig.context.charge().state(), ChargeState::Charging);

    rig.advance(Duration::from_millis(2_000));
    rig.link.send(&status_frame(99, 90, 20, true));
    rig.cycle();
    assert_eq!(rig.context.charge().state(), ChargeState::Paused);
    assert_eq!(rig.power.toggles, 3);
}

#[test]
fn residual_bytes_are_drained_after_each_frame() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.cycle();
    rig.clear();

    let mut bytes = status_frame(50, 90, 20, true);
    bytes.extend_from_slice(b"\r\nxyz");
    rig.link.send(&bytes);

    let report = rig.cycle();
    assert_eq!(report.drained, 5);
    assert!(!rig.link.bytes_available());
    assert_eq!(
        rig.events().last(),
        Some(&StatusEvent::BytesDrained { count: 5 })
    );
}

#[test]
fn short_read_is_discarded_and_cycle_continues() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.cycle();
    rig.clear();

    rig.link.send(b"12:00:00HEART");
    let report = rig.cycle();
    assert_eq!(
        report.frame,
        Some(FrameDisposition::Discarded { received: 13 })
    );
    assert_eq!(report.drained, 0);
    assert_eq!(
        rig.events(),
        vec![StatusEvent::FrameDiscarded { received: 13 }]
    );
    assert_eq!(rig.context.link().last_liveness(), None);

    rig.link.send(b"12:00:01HEARTBEAT1");
    let report = rig.cycle();
    assert_eq!(report.frame, Some(FrameDisposition::Heartbeat));
}

#[test]
fn idle_cycles_refresh_filtered_current_while_charging() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.raw_current_ma = 316;
    rig.cycle();
    rig.clear();

    rig.cycle();
    assert_eq!(
        rig.events(),
        vec![StatusEvent::ChargeStatus {
            state: ChargeState::Charging,
            current_ma: Some(300),
        }]
    );
}

#[test]
fn paused_idle_cycles_stay_quiet() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.raw_current_ma = 516;
    rig.cycle();

    rig.link.send(&status_frame(95, 90, 20, true));
    rig.cycle();
    assert_eq!(rig.context.charge().state(), ChargeState::Paused);
    rig.clear();

    for _ in 0..10 {
        rig.cycle();
    }
    assert!(
        !rig.events()
            .iter()
            .any(|event| matches!(event, StatusEvent::ChargeStatus { .. }))
    );
}

#[test]
fn resume_defers_current_sample_until_settled() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.cycle();
    rig.link.send(&status_frame(95, 90, 20, true));
    rig.cycle();
    rig.clear();

    rig.raw_current_ma = 0;
    rig.link.send(&status_frame(15, 90, 20, true));
    rig.cycle();
    assert_eq!(
        rig.events(),
        vec![
            StatusEvent::ReadingReceived {
                reading: charger_core::frame::StatusReading::new(15, 90, 20, true),
                sent_at: charger_core::frame::FrameTimestamp::new(*b"12:00:00"),
            },
            StatusEvent::ChargingResumed { battery_pct: 15 },
        ]
    );
}

#[test]
fn silent_link_warns_once_per_window() {
    let config = ChargerConfig::new().with_stale_after(Duration::from_secs(300));
    let mut rig = Rig::new(config);
    rig.link.up = true;
    rig.cycle();

    rig.link.send(b"12:00:00HEARTBEAT1");
    rig.cycle();
    rig.clear();

    rig.advance(Duration::from_secs(299));
    rig.cycle();
    assert!(
        !rig.events()
            .iter()
            .any(|event| matches!(event, StatusEvent::StaleHeartbeatWarning { .. }))
    );

    rig.advance(Duration::from_secs(1));
    rig.cycle();
    rig.cycle();
    rig.cycle();
    let warnings = rig
        .events()
        .iter()
        .filter(|event| matches!(event, StatusEvent::StaleHeartbeatWarning { .. }))
        .count();
    assert_eq!(warnings, 1);
}

#[test]
fn unplugged_phone_gets_advisory_on_heartbeat_and_reading() {
    let mut rig = Rig::new(ChargerConfig::new());
    rig.link.up = true;
    rig.cycle();
    rig.clear();

    rig.link.send(b"12:00:00HEARTBEAT0");
    rig.cycle();
    rig.link.send(&status_frame(40, 90, 20, false));
    rig.cycle();

    let advisories = rig
        .events()
        .iter()
        .filter(|event| **event == StatusEvent::PlugInAdvisory)
        .count();
    assert_eq!(advisories, 2);
}
