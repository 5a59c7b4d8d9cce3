//! Rolling-average filter for the charge current shown on the display.
//!
//! Samples come from the current sensor in milliamps. A fixed baseline (the
//! status LED draw) is subtracted and the result clamped at zero. The filter
//! keeps a fixed ring of recent samples and reports the mean of the first
//! `N - 1` slots; the cursor never reaches the last slot, so it only ever holds
//! a bootstrap value.
//!
//! After a zero reading the filter re-enters [`FilterMode::FirstCharge`]: the
//! next nonzero sample overwrites every slot so the display jumps straight to
//! the new current instead of ramping up from zero.

/// Number of slots in the default filter ring.
pub const FILTER_CAPACITY: usize = 19;

/// Source of raw current readings.
pub trait CurrentSensor {
    /// Performs one acquisition and returns the raw current in milliamps.
    fn read_raw_current_ma(&mut self) -> u16;
}

impl<F> CurrentSensor for F
where
    F: FnMut() -> u16,
{
    fn read_raw_current_ma(&mut self) -> u16 {
        self()
    }
}

/// Bootstrap mode of the filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FilterMode {
    /// The last sample was zero; the next nonzero sample fills the ring.
    FirstCharge,
    /// Samples are written one slot at a time.
    Tracking,
}

/// Bounded circular-buffer current filter.
#[derive(Clone, Debug)]
pub struct CurrentFilter<const N: usize = FILTER_CAPACITY> {
    slots: [u16; N],
    cursor: usize,
    mode: FilterMode,
    baseline_offset_ma: u16,
}

impl<const N: usize> CurrentFilter<N> {
    /// Slots covered by the cursor and the average.
    pub const WINDOW: usize = {
        assert!(N >= 2, "current filter needs at least two slots");
        N - 1
    };

    /// Creates a zero-filled filter in first-charge mode.
    #[must_use]
    pub const fn new(baseline_offset_ma: u16) -> Self {
        Self {
            slots: [0; N],
            cursor: 0,
            mode: FilterMode::FirstCharge,
            baseline_offset_ma,
        }
    }

    /// Acquires one reading from `sensor` and returns the updated average.
    pub fn sample<S>(&mut self, sensor: &mut S) -> u16
    where
        S: CurrentSensor + ?Sized,
    {
        let raw = sensor.read_raw_current_ma();
        self.push(raw)
    }

    /// Feeds an already-acquired raw reading and returns the updated average.
    pub fn push(&mut self, raw_ma: u16) -> u16 {
        let value = raw_ma.saturating_sub(self.baseline_offset_ma);

        if value == 0 {
            self.mode = FilterMode::FirstCharge;
        } else if self.mode == FilterMode::FirstCharge {
            self.slots = [value; N];
            self.mode = FilterMode::Tracking;
        }

        self.slots[self.cursor] = value;
        self.cursor += 1;
        if self.cursor >= Self::WINDOW {
            self.cursor = 0;
        }

        self.average()
    }

    /// Returns the mean of the active window without sampling.
    #[must_use]
    pub fn average(&self) -> u16 {
        let sum: u32 = self.slots[..Self::WINDOW]
            .iter()
            .map(|&slot| u32::from(slot))
            .sum();
        let window = u32::try_from(Self::WINDOW).unwrap_or(u32::MAX);
        u16::try_from(sum / window).unwrap_or(u16::MAX)
    }

    #[must_use]
    pub const fn mode(&self) -> FilterMode {
        self.mode
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub const fn baseline_offset_ma(&self) -> u16 {
        self.baseline_offset_ma
    }
}

impl<const N: usize> Default for CurrentFilter<N> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BASELINE_OFFSET_MA)
    }
}
