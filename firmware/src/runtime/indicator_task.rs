//! Connected and heartbeat LEDs.
//!
//! The connected LED is solid while the link is up and blinks once the phone
//! has been silent for the stale window.

use charger_core::config::DEFAULT_STALE_AFTER;
use charger_core::link::LinkState;
use embassy_futures::select::{Either, select};
use embassy_stm32::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use crate::instant::FirmwareInstant;
use crate::status;

/// Raised by the charge task whenever a frame proves the phone is alive.
pub static HEARTBEAT_PULSE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

const REFRESH_INTERVAL: Duration = Duration::from_millis(250);
const PULSE_WIDTH: Duration = Duration::from_millis(150);

#[embassy_executor::task]
pub async fn run(mut connected_led: Output<'static>, mut heartbeat_led: Output<'static>) -> ! {
    let mut blink = false;
    loop {
        let woke = select(HEARTBEAT_PULSE.wait(), Timer::after(REFRESH_INTERVAL)).await;
        if let Either::First(()) = woke {
            heartbeat_led.set_high();
            Timer::after(PULSE_WIDTH).await;
            heartbeat_led.set_low();
        }

        let snapshot = status::snapshot(FirmwareInstant::now());
        let lit = if snapshot.is_stale(DEFAULT_STALE_AFTER) {
            blink = !blink;
            blink
        } else {
            snapshot.link == LinkState::Connected
        };
        connected_led.set_level(Level::from(lit));
    }
}
