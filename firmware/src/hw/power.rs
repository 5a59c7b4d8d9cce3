//! Charging power switch (MOSFET gate plus indicator LED).
//!
//! The gate is driven push-pull; high enables the supply to the phone. The
//! pin comes up high at boot so the controller starts in the charging state.

use charger_core::charge::PowerOutput;
use embassy_stm32::gpio::{Level, Output};

pub struct PowerSwitch<'d> {
    pin: Output<'d>,
}

impl<'d> PowerSwitch<'d> {
    /// Wraps an output pin that was configured high.
    pub fn new(pin: Output<'d>) -> Self {
        Self { pin }
    }
}

impl PowerOutput for PowerSwitch<'_> {
    fn set_enabled(&mut self, enabled: bool) {
        self.pin.set_level(Level::from(enabled));
    }
}
