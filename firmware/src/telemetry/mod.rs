//! Status sink and logging helpers.
//!
//! [`LogSink`] receives every controller event, numbers it, mirrors it into
//! the status atomics, and renders a log line to defmt (or stdout on host
//! builds).

use charger_core::telemetry::{EventId, StatusEvent, StatusSink};

use crate::instant::FirmwareInstant;
use crate::status;

/// Firmware status sink.
pub struct LogSink {
    next_id: EventId,
}

impl LogSink {
    pub const fn new() -> Self {
        Self { next_id: 0 }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink<FirmwareInstant> for LogSink {
    fn emit(&mut self, event: StatusEvent, timestamp: FirmwareInstant) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        status::record_event(&event, timestamp);
        emit_log(id, &event, timestamp.as_micros());
    }
}

const fn is_warning(event: &StatusEvent) -> bool {
    matches!(
        event,
        StatusEvent::StaleHeartbeatWarning { .. } | StatusEvent::FrameDiscarded { .. }
    )
}

#[cfg(target_os = "none")]
fn emit_log(id: EventId, event: &StatusEvent, timestamp_us: u64) {
    if is_warning(event) {
        defmt::warn!(
            "status #{} {} t={}us",
            id,
            defmt::Display2Format(event),
            timestamp_us
        );
    } else {
        defmt::info!(
            "status #{} {} t={}us",
            id,
            defmt::Display2Format(event),
            timestamp_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: EventId, event: &StatusEvent, timestamp_us: u64) {
    let level = if is_warning(event) { "WARN" } else { "INFO" };
    println!("{level} status #{id} {event} t={timestamp_us}us");
}
