//! # Lock Loop
//!
//! Keeps the receiver's tick aligned with the transmitter in both time and
//! frequency.
//!
//! ## Phase Path
//!
//! Runs on every accepted frame. The arrival time relative to the last tick
//! should sit in the middle of the frame interval:
//!
//! ```text
//! error  = (arrival - last_tick) mod interval
//! offset = lpf(error - interval / 2)
//! shift  = (offset >> PHASE_GAIN_SHIFT) + bias
//! ```
//!
//! ## Frequency Path
//!
//! Runs once per hop, because the radio's frequency error reading is only
//! meaningful once per channel. The filtered error nudges a saturating
//! correction register one quantum at a time.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::filter::LowPassFilter;

/// Right-shift applied to the filtered offset before it becomes a phase shift.
pub const PHASE_GAIN_SHIFT: u32 = 4;

/// Smoothing exponent of the phase offset filter.
pub const OFFSET_FILTER_BETA: u32 = 3;

/// Smoothing exponent of the frequency error filter.
pub const FREQ_ERROR_FILTER_BETA: u32 = 3;

/// Tunables for the lock loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LockLoopConfig {
    #[serde(default = "default_correction_min")]
    pub correction_min: i32,

    #[serde(default = "default_correction_max")]
    pub correction_max: i32,

    /// Smallest frequency step the radio can apply
    #[serde(default = "default_correction_step")]
    pub correction_step: i32,

    /// Constant added to every phase shift to cover handler latency
    #[serde(default)]
    pub phase_bias_us: i32,
}

fn default_correction_min() -> i32 { -100_000 }
fn default_correction_max() -> i32 { 100_000 }
fn default_correction_step() -> i32 { 61 }

impl Default for LockLoopConfig {
    fn default() -> Self {
        Self {
            correction_min: default_correction_min(),
            correction_max: default_correction_max(),
            correction_step: default_correction_step(),
            phase_bias_us: 0,
        }
    }
}

/// Saturating frequency correction register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyCorrection {
    value: i32,
    min: i32,
    max: i32,
    step: i32,
}

impl FrequencyCorrection {
    /// Creates a register at zero with the given bounds.
    #[must_use]
    pub fn new(min: i32, max: i32, step: i32) -> Self {
        Self {
            value: 0,
            min,
            max,
            step,
        }
    }

    /// Current correction.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.value
    }

    /// Adds one step. Returns `false` when already pinned at `max`.
    pub fn step_up(&mut self) -> bool {
        if self.value >= self.max {
            self.value = self.max;
            return false;
        }
        self.value = self.value.saturating_add(self.step).min(self.max);
        true
    }

    /// Removes one step. Returns `false` when already pinned at `min`.
    pub fn step_down(&mut self) -> bool {
        if self.value <= self.min {
            self.value = self.min;
            return false;
        }
        self.value = self.value.saturating_sub(self.step).max(self.min);
        true
    }

    /// Back to neutral.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

/// Phase and frequency tracking state.
#[derive(Debug, Clone)]
pub struct LockLoop {
    offset_filter: LowPassFilter,
    freq_error_filter: LowPassFilter,
    correction: FrequencyCorrection,
    phase_bias_us: i32,
    last_raw_error_us: i32,
}

impl LockLoop {
    /// Creates a loop in the neutral state.
    #[must_use]
    pub fn new(config: &LockLoopConfig) -> Self {
        Self {
            offset_filter: LowPassFilter::new(OFFSET_FILTER_BETA),
            freq_error_filter: LowPassFilter::new(FREQ_ERROR_FILTER_BETA),
            correction: FrequencyCorrection::new(
                config.correction_min,
                config.correction_max,
                config.correction_step,
            ),
            phase_bias_us: config.phase_bias_us,
            last_raw_error_us: 0,
        }
    }

    /// Filtered phase offset in µs (positive: frames arrive late in the slot).
    #[must_use]
    pub fn offset_us(&self) -> i32 {
        self.offset_filter.value()
    }

    /// Unfiltered arrival error of the most recent frame.
    #[must_use]
    pub fn last_raw_error_us(&self) -> i32 {
        self.last_raw_error_us
    }

    /// Current frequency correction register.
    #[must_use]
    pub fn frequency_correction(&self) -> i32 {
        self.correction.value()
    }

    /// Filtered frequency error.
    #[must_use]
    pub fn frequency_error(&self) -> i32 {
        self.freq_error_filter.value()
    }

    /// Phase path: returns the shift to apply to the tick timer.
    ///
    /// # Arguments
    ///
    /// * `arrival_us` - Time the frame was received
    /// * `last_tick_us` - Time of the most recent scheduler tick
    /// * `interval_us` - Frame interval of the current profile
    pub fn phase_shift(&mut self, arrival_us: u64, last_tick_us: u64, interval_us: u32) -> i32 {
        let interval = u64::from(interval_us.max(1));
        let error = i32::try_from(arrival_us.saturating_sub(last_tick_us) % interval).unwrap_or(i32::MAX);
        self.last_raw_error_us = error;
        let offset = self.update_offset(error, interval_us);
        (offset >> PHASE_GAIN_SHIFT).saturating_add(self.phase_bias_us)
    }

    /// Feeds one arrival error through the offset filter.
    pub fn update_offset(&mut self, error_us: i32, interval_us: u32) -> i32 {
        let centred = error_us.saturating_sub(i32::try_from(interval_us >> 1).unwrap_or(i32::MAX));
        self.offset_filter.update(centred)
    }

    /// Frequency path: filters `measured_error` and steps the correction.
    ///
    /// Returns the updated correction, ready to push to the radio.
    pub fn update_frequency(&mut self, measured_error: i32) -> i32 {
        let filtered = self.freq_error_filter.update(measured_error);

        if filtered > 0 {
            if !self.correction.step_up() {
                warn!("Frequency correction pinned at maximum ({})", self.correction.value());
            }
        } else if filtered < 0 && !self.correction.step_down() {
            warn!("Frequency correction pinned at minimum ({})", self.correction.value());
        }

        debug!(
            "Frequency error {} Hz (filtered {}), correction {}",
            measured_error,
            filtered,
            self.correction.value()
        );
        self.correction.value()
    }

    /// Resets the phase filter, e.g. after a rate change.
    pub fn reset_phase(&mut self) {
        self.offset_filter.init(0);
        self.last_raw_error_us = 0;
    }

    /// Resets both filters and the correction register to neutral.
    pub fn reset(&mut self) {
        self.reset_phase();
        self.freq_error_filter.init(0);
        self.correction.reset();
    }
}
