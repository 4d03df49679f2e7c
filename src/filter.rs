//! # Low-Pass Filter
//!
//! Integer exponential smoothing used by the lock loop and the uplink
//! statistics.
//!
//! Each update computes `y += (x - y) / 2^beta` in fixed point with
//! [`FP_SHIFT`] fractional bits, so the filter costs a couple of shifts and
//! adds and is safe to run from either event handler. A larger `beta` gives a
//! longer effective window of about `2^beta` samples.

/// Fractional bits kept in the internal accumulator.
pub const FP_SHIFT: u32 = 5;

fn clamp_to_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Exponential low-pass filter over `i32` samples.
///
/// The accumulator is 64-bit, so any `i32` input is accepted for
/// `beta` up to 26.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowPassFilter {
    beta: u32,
    smooth_fp: i64,
    value: i32,
}

impl LowPassFilter {
    /// Creates a filter with the given smoothing exponent, starting at zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_link_rx::filter::LowPassFilter;
    ///
    /// let mut lpf = LowPassFilter::new(3);
    /// for _ in 0..100 {
    ///     lpf.update(800);
    /// }
    /// assert!((lpf.value() - 800).abs() <= 1);
    /// ```
    #[must_use]
    pub const fn new(beta: u32) -> Self {
        Self {
            beta,
            smooth_fp: 0,
            value: 0,
        }
    }

    /// Smoothing exponent.
    #[must_use]
    pub const fn beta(&self) -> u32 {
        self.beta
    }

    /// Last filtered output.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }

    /// Feeds one sample and returns the new filtered value.
    pub fn update(&mut self, input: i32) -> i32 {
        let raw = i64::from(input) << FP_SHIFT;
        let scaled = (self.smooth_fp << self.beta) - self.smooth_fp + raw;
        self.smooth_fp = scaled >> self.beta;
        self.value = clamp_to_i32(self.smooth_fp >> FP_SHIFT);
        self.value
    }

    /// Forces the filter state to `value`.
    pub fn init(&mut self, value: i32) {
        self.smooth_fp = i64::from(value) << FP_SHIFT;
        self.value = value;
    }
}
