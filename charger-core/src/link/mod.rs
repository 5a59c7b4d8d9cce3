//! Phone link liveness tracking.
//!
//! The radio module exposes a "connected" pin that is sampled once per polling
//! cycle. Edges on that signal are reported once each. While connected, the
//! monitor also expects a frame (heartbeat or reading) at least every
//! `stale_after`; a silent link produces a single warning per window.

use core::fmt;
use core::time::Duration;

use crate::config::DEFAULT_STALE_AFTER;
use crate::instant::MonotonicInstant;

/// Physical link state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connected => f.write_str("connected"),
            LinkState::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Events produced by the link monitor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    StaleHeartbeat { silent_for: Duration },
}

/// Tracks link edges and heartbeat staleness.
#[derive(Clone, Debug)]
pub struct LinkMonitor<I> {
    state: LinkState,
    last_liveness: Option<I>,
    stale_reference: Option<I>,
    stale_after: Duration,
}

impl<I> LinkMonitor<I>
where
    I: MonotonicInstant,
{
    /// Creates a disconnected monitor with the given staleness window.
    #[must_use]
    pub const fn new(stale_after: Duration) -> Self {
        Self {
            state: LinkState::Disconnected,
            last_liveness: None,
            stale_reference: None,
            stale_after,
        }
    }

    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Instant of the last heartbeat or reading, if any arrived.
    #[must_use]
    pub const fn last_liveness(&self) -> Option<I> {
        self.last_liveness
    }

    /// Samples the link signal, returning an event on edges only.
    pub fn poll_signal(&mut self, link_up: bool, now: I) -> Option<LinkEvent> {
        let event = match (self.state, link_up) {
            (LinkState::Disconnected, true) => {
                self.state = LinkState::Connected;
                Some(LinkEvent::Connected)
            }
            (LinkState::Connected, false) => {
                self.state = LinkState::Disconnected;
                Some(LinkEvent::Disconnected)
            }
            _ => None,
        };

        if self.state == LinkState::Connected && self.stale_reference.is_none() {
            self.stale_reference = Some(now);
        }

        event
    }

    /// Records a heartbeat or status reading received at `now`.
    pub fn note_liveness(&mut self, now: I) {
        self.last_liveness = Some(now);
        self.stale_reference = Some(now);
    }

    /// Emits a staleness warning when the link has been silent too long.
    ///
    /// The reference point moves to `now` after each warning, so a silent link
    /// warns at most once per window.
    pub fn check_stale(&mut self, now: I) -> Option<LinkEvent> {
        if self.state != LinkState::Connected {
            return None;
        }

        let reference = self.stale_reference?;
        let silent_for = now.saturating_duration_since(reference);
        if silent_for < self.stale_after {
            return None;
        }

        self.stale_reference = Some(now);
        Some(LinkEvent::StaleHeartbeat { silent_for })
    }
}

impl<I> Default for LinkMonitor<I>
where
    I: MonotonicInstant,
{
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}
