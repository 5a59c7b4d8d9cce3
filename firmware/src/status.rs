#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics mirror the link state and the instant of the last heartbeat or
//! reading so the indicator task can render a [`StatusSnapshot`] without
//! borrowing the controller context.

use core::time::Duration;

use charger_core::link::LinkState;
use charger_core::telemetry::StatusEvent;
use portable_atomic::{AtomicBool, AtomicU64, Ordering};

use crate::instant::FirmwareInstant;

const NEVER: u64 = 0;

/// Tracks whether the phone link is connected.
static LINK_CONNECTED: AtomicBool = AtomicBool::new(false);
/// Uptime (µs, +1) of the last heartbeat or reading.
static LIVENESS_MICROS: AtomicU64 = AtomicU64::new(NEVER);

/// Point-in-time view of the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub link: LinkState,
    /// Time since the last heartbeat or reading; `None` before the first one.
    pub silent_for: Option<Duration>,
}

impl StatusSnapshot {
    /// Connected but quiet for at least `window`.
    #[must_use]
    pub fn is_stale(&self, window: Duration) -> bool {
        self.link == LinkState::Connected && self.silent_for.is_some_and(|silent| silent >= window)
    }
}

/// Mirrors a status event into the snapshot atomics.
pub fn record_event(event: &StatusEvent, timestamp: FirmwareInstant) {
    match event {
        StatusEvent::Connected => LINK_CONNECTED.store(true, Ordering::Relaxed),
        StatusEvent::Disconnected => LINK_CONNECTED.store(false, Ordering::Relaxed),
        StatusEvent::HeartbeatReceived { .. } | StatusEvent::ReadingReceived { .. } => {
            LIVENESS_MICROS.store(timestamp.as_micros().saturating_add(1), Ordering::Relaxed);
        }
        _ => {}
    }
}

/// Builds a [`StatusSnapshot`] from the stored values.
pub fn snapshot(now: FirmwareInstant) -> StatusSnapshot {
    let link = if LINK_CONNECTED.load(Ordering::Relaxed) {
        LinkState::Connected
    } else {
        LinkState::Disconnected
    };
    let silent_for = match LIVENESS_MICROS.load(Ordering::Relaxed) {
        NEVER => None,
        stored => Some(Duration::from_micros(
            now.as_micros().saturating_sub(stored - 1),
        )),
    };

    StatusSnapshot { link, silent_for }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charger_core::frame::{FrameTimestamp, StatusReading};
    use embassy_time::Instant;

    fn at(millis: u64) -> FirmwareInstant {
        FirmwareInstant::from(Instant::from_millis(millis))
    }

    // Single test: the atomics are process-wide.
    #[test]
    fn events_update_snapshot() {
        let initial = snapshot(at(0));
        assert_eq!(initial.link, LinkState::Disconnected);
        assert_eq!(initial.silent_for, None);

        record_event(&StatusEvent::Connected, at(10));
        record_event(
            &StatusEvent::ReadingReceived {
                reading: StatusReading::new(95, 90, 20, true),
                sent_at: FrameTimestamp::new(*b"10:00:00"),
            },
            at(20),
        );

        let connected = snapshot(at(520));
        assert_eq!(connected.link, LinkState::Connected);
        assert_eq!(connected.silent_for, Some(Duration::from_millis(500)));
        assert!(!connected.is_stale(Duration::from_secs(300)));

        // Well past the point where a 32-bit microsecond counter wraps.
        let heard_at = 72 * 60 * 1_000;
        record_event(
            &StatusEvent::HeartbeatReceived {
                sent_at: FrameTimestamp::new(*b"11:12:00"),
            },
            at(heard_at),
        );
        let later = snapshot(at(heard_at + 60_000));
        assert_eq!(later.silent_for, Some(Duration::from_secs(60)));

        let stale = snapshot(at(heard_at + 300_000));
        assert!(stale.is_stale(Duration::from_secs(300)));

        record_event(&StatusEvent::Disconnected, at(heard_at + 300_000));
        assert!(!snapshot(at(heard_at + 300_000)).is_stale(Duration::from_secs(300)));
    }
}
