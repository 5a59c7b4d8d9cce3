//! Status events and the fixed-capacity recorder shared by firmware and host.
//!
//! Every observable action of the controller is reported as a [`StatusEvent`]
//! through a [`StatusSink`]. Firmware renders them to defmt, the emulator to
//! its transcript, and [`StatusRecorder`] keeps the most recent ones in a
//! `heapless` ring with monotonically increasing ids.

use core::fmt;
use core::time::Duration;

use heapless::HistoryBuf;

use crate::charge::ChargeState;
use crate::frame::{FrameTimestamp, StatusReading};

/// Identifier assigned to recorded events; wraps on overflow.
pub type EventId = u32;

/// Total number of status records retained in memory.
pub const STATUS_RING_CAPACITY: usize = 64;

/// Observable controller events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StatusEvent {
    Connected,
    Disconnected,
    HeartbeatReceived {
        sent_at: FrameTimestamp,
    },
    ReadingReceived {
        reading: StatusReading,
        sent_at: FrameTimestamp,
    },
    ChargingPaused {
        battery_pct: u16,
    },
    ChargingResumed {
        battery_pct: u16,
    },
    /// Display refresh; `current_ma` is present while charging.
    ChargeStatus {
        state: ChargeState,
        current_ma: Option<u16>,
    },
    PlugInAdvisory,
    StaleHeartbeatWarning {
        silent_for: Duration,
    },
    FrameDiscarded {
        received: usize,
    },
    BytesDrained {
        count: usize,
    },
}

impl StatusEvent {
    const CONNECTED_CODE: u8 = 0x01;
    const DISCONNECTED_CODE: u8 = 0x02;
    const HEARTBEAT_CODE: u8 = 0x03;
    const READING_CODE: u8 = 0x04;
    const PAUSED_CODE: u8 = 0x05;
    const RESUMED_CODE: u8 = 0x06;
    const CHARGE_STATUS_CODE: u8 = 0x07;
    const ADVISORY_CODE: u8 = 0x08;
    const STALE_CODE: u8 = 0x09;
    const DISCARDED_CODE: u8 = 0x0A;
    const DRAINED_CODE: u8 = 0x0B;

    /// Encodes the event kind into a compact discriminant for status snapshots.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            StatusEvent::Connected => Self::CONNECTED_CODE,
            StatusEvent::Disconnected => Self::DISCONNECTED_CODE,
            StatusEvent::HeartbeatReceived { .. } => Self::HEARTBEAT_CODE,
            StatusEvent::ReadingReceived { .. } => Self::READING_CODE,
            StatusEvent::ChargingPaused { .. } => Self::PAUSED_CODE,
            StatusEvent::ChargingResumed { .. } => Self::RESUMED_CODE,
            StatusEvent::ChargeStatus { .. } => Self::CHARGE_STATUS_CODE,
            StatusEvent::PlugInAdvisory => Self::ADVISORY_CODE,
            StatusEvent::StaleHeartbeatWarning { .. } => Self::STALE_CODE,
            StatusEvent::FrameDiscarded { .. } => Self::DISCARDED_CODE,
            StatusEvent::BytesDrained { .. } => Self::DRAINED_CODE,
        }
    }

    /// Short kebab-case name for the event kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            StatusEvent::Connected => "connected",
            StatusEvent::Disconnected => "disconnected",
            StatusEvent::HeartbeatReceived { .. } => "heartbeat",
            StatusEvent::ReadingReceived { .. } => "reading",
            StatusEvent::ChargingPaused { .. } => "charging-paused",
            StatusEvent::ChargingResumed { .. } => "charging-resumed",
            StatusEvent::ChargeStatus { .. } => "charge-status",
            StatusEvent::PlugInAdvisory => "plug-in-advisory",
            StatusEvent::StaleHeartbeatWarning { .. } => "stale-heartbeat",
            StatusEvent::FrameDiscarded { .. } => "frame-discarded",
            StatusEvent::BytesDrained { .. } => "bytes-drained",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            StatusEvent::Connected
            | StatusEvent::Disconnected
            | StatusEvent::PlugInAdvisory => f.write_str(name),
            StatusEvent::HeartbeatReceived { sent_at } => write!(f, "{name} at={sent_at}"),
            StatusEvent::ReadingReceived { reading, sent_at } => write!(
                f,
                "{name} at={sent_at} battery={}% max={}% min={}% plugged={}",
                reading.battery_pct,
                reading.max_threshold,
                reading.min_threshold,
                if reading.plugged_in { "yes" } else { "no" },
            ),
            StatusEvent::ChargingPaused { battery_pct }
            | StatusEvent::ChargingResumed { battery_pct } => {
                write!(f, "{name} battery={battery_pct}%")
            }
            StatusEvent::ChargeStatus { state, current_ma } => match current_ma {
                Some(current) => write!(f, "{name} {state} current={current}mA"),
                None => write!(f, "{name} {state}"),
            },
            StatusEvent::StaleHeartbeatWarning { silent_for } => {
                write!(f, "{name} silent={}ms", silent_for.as_millis())
            }
            StatusEvent::FrameDiscarded { received } => {
                write!(f, "{name} received={received}")
            }
            StatusEvent::BytesDrained { count } => write!(f, "{name} count={count}"),
        }
    }
}

/// Receiver of controller status events.
pub trait StatusSink<I> {
    fn emit(&mut self, event: StatusEvent, timestamp: I);
}

/// Status record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusRecord<I>
where
    I: Copy,
{
    pub id: EventId,
    pub timestamp: I,
    pub event: StatusEvent,
}

/// Status ring buffer type alias.
pub type StatusRing<I, const CAPACITY: usize = STATUS_RING_CAPACITY> =
    HistoryBuf<StatusRecord<I>, CAPACITY>;

/// Records status events into a fixed-size ring buffer.
pub struct StatusRecorder<I, const CAPACITY: usize = STATUS_RING_CAPACITY>
where
    I: Copy,
{
    ring: StatusRing<I, CAPACITY>,
    next_event_id: EventId,
}

impl<I, const CAPACITY: usize> StatusRecorder<I, CAPACITY>
where
    I: Copy,
{
    /// Creates a new recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records an event and returns its id.
    pub fn record(&mut self, event: StatusEvent, timestamp: I) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(StatusRecord {
            id,
            timestamp,
            event,
        });

        id
    }

    /// Returns an iterator over the recorded events in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &StatusRecord<I>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent record, if available.
    pub fn latest(&self) -> Option<&StatusRecord<I>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Drops every stored record; ids keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl<I, const CAPACITY: usize> Default for StatusRecorder<I, CAPACITY>
where
    I: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, const CAPACITY: usize> StatusSink<I> for StatusRecorder<I, CAPACITY>
where
    I: Copy,
{
    fn emit(&mut self, event: StatusEvent, timestamp: I) {
        self.record(event, timestamp);
    }
}
