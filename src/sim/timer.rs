//! # Simulated Timer and Clock

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::hal::{Clock, TickTimer};

#[derive(Debug, Default)]
struct TimerState {
    interval_us: u32,
    pending_shift_us: i32,
    last_tick_us: u64,
}

/// Tick timer whose firing is driven by the bench.
///
/// A phase shift moves only the next tick, like a hardware timer whose
/// compare register is nudged once.
#[derive(Debug, Clone, Default)]
pub struct SimTimer {
    state: Arc<Mutex<TimerState>>,
}

impl SimTimer {
    /// Creates a stopped timer whose first period starts at `now_us`.
    #[must_use]
    pub fn new(now_us: u64) -> Self {
        let timer = Self::default();
        timer.state().last_tick_us = now_us;
        timer
    }

    /// When the next tick is due. Always later than the previous tick.
    #[must_use]
    pub fn next_tick_at(&self) -> u64 {
        let state = self.state();
        let period = i64::from(state.interval_us.max(1)) + i64::from(state.pending_shift_us);
        state.last_tick_us + period.max(1) as u64
    }

    /// Records that the tick due at `at_us` fired.
    pub fn mark_tick(&self, at_us: u64) {
        let mut state = self.state();
        state.last_tick_us = at_us;
        state.pending_shift_us = 0;
    }

    fn state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TickTimer for SimTimer {
    fn set_interval(&mut self, interval_us: u32) {
        self.state().interval_us = interval_us;
    }

    fn phase_shift(&mut self, delta_us: i32) {
        self.state().pending_shift_us = delta_us;
    }

    fn last_callback_micros(&self) -> u64 {
        self.state().last_tick_us
    }
}

/// Wall clock measured from process start.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// The instant corresponding to `micros() == 0`.
    #[must_use]
    pub fn origin(&self) -> Instant {
        self.origin
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}
