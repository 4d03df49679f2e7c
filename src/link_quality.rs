//! # Link Quality
//!
//! Rolling percentage of expected frame slots that were actually filled.
//!
//! Every scheduler tick opens a new slot as a miss ([`LinkQuality::advance`]).
//! An accepted frame or an outgoing telemetry reply then marks that slot as a
//! hit ([`LinkQuality::mark_hit`]). Decode attempts do not consume slots, so a
//! burst of corrupted frames costs at most one slot per tick.

/// Number of slots in the window.
pub const LQ_WINDOW: usize = 100;

/// Fixed-size circular window of per-slot receive outcomes.
#[derive(Debug, Clone)]
pub struct LinkQuality {
    slots: [bool; LQ_WINDOW],
    cursor: usize,
    hits: usize,
}

impl Default for LinkQuality {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkQuality {
    /// Creates an all-miss window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [false; LQ_WINDOW],
            cursor: 0,
            hits: 0,
        }
    }

    /// Opens the next slot, initially a miss.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % LQ_WINDOW;
        if self.slots[self.cursor] {
            self.slots[self.cursor] = false;
            self.hits -= 1;
        }
    }

    /// Marks the current slot as a hit. Repeated calls in one slot count once.
    pub fn mark_hit(&mut self) {
        if !self.slots[self.cursor] {
            self.slots[self.cursor] = true;
            self.hits += 1;
        }
    }

    /// Opens the next slot and records its outcome in one step.
    pub fn record_outcome(&mut self, hit: bool) {
        self.advance();
        if hit {
            self.mark_hit();
        }
    }

    /// Whether the current slot has been marked.
    #[must_use]
    pub fn current_is_hit(&self) -> bool {
        self.slots[self.cursor]
    }

    /// Percentage of hits in the window (0-100).
    #[must_use]
    pub fn quality(&self) -> u8 {
        (self.hits * 100 / LQ_WINDOW) as u8
    }

    /// Clears the window to all misses.
    pub fn reset(&mut self) {
        self.slots = [false; LQ_WINDOW];
        self.cursor = 0;
        self.hits = 0;
    }
}
