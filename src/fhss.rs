//! # Frequency Hopping Sequence
//!
//! Both ends of the link derive the same channel order from the shared
//! [`DeviceIdentity`]. The order is never sent over the air, so generation must
//! be reproducible bit-for-bit.
//!
//! ## Sequence Rules
//!
//! - The sequence is a permutation of the channel set, so every channel
//!   appears exactly once per cycle.
//! - Slot 0 always holds channel 0. This is the channel both sides return to
//!   when the link is lost or the rate changes.
//! - Slots `1..N` are shuffled with a 31-bit LCG seeded from the identity.

use serde::Deserialize;

use crate::identity::DeviceIdentity;

const LCG_MULTIPLIER: u32 = 214_013;
const LCG_INCREMENT: u32 = 2_531_011;
const LCG_MODULUS_MASK: u32 = 0x7FFF_FFFF;

/// Regulatory domain, selecting the allowed channel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatoryDomain {
    /// Australia 915 MHz (20 channels)
    Au915,
    /// US FCC 915 MHz (40 channels)
    Fcc915,
    /// Europe 868 MHz (13 channels)
    Eu868,
    /// Australia 433 MHz (3 channels)
    Au433,
    /// Europe 433 MHz (3 channels)
    Eu433,
}

impl RegulatoryDomain {
    /// `(first channel Hz, spacing Hz, channel count)`
    const fn plan(self) -> (u32, u32, usize) {
        match self {
            RegulatoryDomain::Au915 => (915_500_000, 600_000, 20),
            RegulatoryDomain::Fcc915 => (903_500_000, 600_000, 40),
            RegulatoryDomain::Eu868 => (863_275_000, 525_000, 13),
            RegulatoryDomain::Au433 | RegulatoryDomain::Eu433 => (433_420_000, 500_000, 3),
        }
    }

    /// Channel centre frequencies in Hz, lowest first.
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_link_rx::fhss::RegulatoryDomain;
    ///
    /// let channels = RegulatoryDomain::Eu868.frequencies();
    /// assert_eq!(channels.len(), 13);
    /// assert_eq!(channels[0], 863_275_000);
    /// ```
    #[must_use]
    pub fn frequencies(self) -> Vec<u32> {
        let (base, spacing, count) = self.plan();
        (0..count as u32).map(|i| base + i * spacing).collect()
    }
}

/// Deterministic pseudo-random generator shared with the transmitter.
#[derive(Debug, Clone)]
struct SequenceRng {
    seed: u32,
}

impl SequenceRng {
    fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Returns a value in `0..max`. `max` must be non-zero.
    fn next_below(&mut self, max: u32) -> u32 {
        self.seed = LCG_MULTIPLIER
            .wrapping_mul(self.seed)
            .wrapping_add(LCG_INCREMENT)
            & LCG_MODULUS_MASK;
        (self.seed >> 16) % max
    }
}

/// Hop sequence plus the current position in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopSequence {
    frequencies: Vec<u32>,
    order: Vec<u8>,
    index: u8,
}

impl HopSequence {
    /// Builds the sequence for `identity` over the given channel set.
    ///
    /// Allocates once; every other operation is allocation-free.
    ///
    /// # Arguments
    ///
    /// * `identity` - Shared device identity providing the seed
    /// * `frequencies` - Channel centre frequencies (1..=256 entries)
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_link_rx::fhss::{HopSequence, RegulatoryDomain};
    /// use fpv_link_rx::identity::DeviceIdentity;
    ///
    /// let id = DeviceIdentity::new([1, 2, 3, 4, 5, 6]);
    /// let freqs = RegulatoryDomain::Au915.frequencies();
    /// let a = HopSequence::generate(&id, &freqs);
    /// let b = HopSequence::generate(&id, &freqs);
    /// assert_eq!(a.order(), b.order());
    /// ```
    #[must_use]
    pub fn generate(identity: &DeviceIdentity, frequencies: &[u32]) -> Self {
        Self::from_seed(identity.hop_seed(), frequencies)
    }

    /// Builds the sequence from a raw seed.
    #[must_use]
    pub fn from_seed(seed: u32, frequencies: &[u32]) -> Self {
        let count = frequencies.len().min(u8::MAX as usize + 1);
        let mut order: Vec<u8> = (0..count).map(|i| i as u8).collect();
        let mut rng = SequenceRng::new(seed);

        for i in 1..count {
            let j = 1 + rng.next_below(count as u32 - 1) as usize;
            order.swap(i, j);
        }

        Self {
            frequencies: frequencies[..count].to_vec(),
            order,
            index: 0,
        }
    }

    /// Number of slots in one hop cycle.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True for an empty channel set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Channel indices in hop order.
    #[must_use]
    pub fn order(&self) -> &[u8] {
        &self.order
    }

    /// Current position in the sequence.
    #[must_use]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Jumps to position `index` (taken modulo the sequence length).
    pub fn set_index(&mut self, index: u8) {
        if !self.is_empty() {
            self.index = (index as usize % self.len()) as u8;
        }
    }

    /// Frequency of the current slot.
    #[must_use]
    pub fn current_frequency(&self) -> u32 {
        self.frequency_at(self.index)
    }

    /// Moves to the next slot and returns its frequency.
    pub fn advance(&mut self) -> u32 {
        if !self.is_empty() {
            self.index = ((self.index as usize + 1) % self.len()) as u8;
        }
        self.current_frequency()
    }

    /// Frequency of slot 0, where a lost link is re-acquired.
    #[must_use]
    pub fn initial_frequency(&self) -> u32 {
        self.frequency_at(0)
    }

    /// Returns to slot 0.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    fn frequency_at(&self, index: u8) -> u32 {
        self.order
            .get(index as usize)
            .and_then(|&channel| self.frequencies.get(channel as usize))
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new([0x10, 0x20, 0x30, 0x40, 0x50, 0x60])
    }

    // ==================== Generation ====================

    #[test]
    fn test_generate_is_deterministic() {
        let freqs = RegulatoryDomain::Fcc915.frequencies();
        let a = HopSequence::generate(&identity(), &freqs);
        let b = HopSequence::generate(&identity(), &freqs);
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_is_permutation_for_many_seeds() {
        for domain in [
            RegulatoryDomain::Au915,
            RegulatoryDomain::Fcc915,
            RegulatoryDomain::Eu868,
            RegulatoryDomain::Au433,
        ] {
            let freqs = domain.frequencies();
            for seed in [0u32, 1, 0xDEAD_BEEF, 0x7FFF_FFFF, u32::MAX, 123_456_789] {
                let seq = HopSequence::from_seed(seed, &freqs);
                assert_eq!(seq.len(), freqs.len());
                let unique: HashSet<u8> = seq.order().iter().copied().collect();
                assert_eq!(unique.len(), freqs.len(), "duplicate channel for seed {seed:#x}");
                assert!(seq.order().iter().all(|&c| (c as usize) < freqs.len()));
            }
        }
    }

    #[test]
    fn test_slot_zero_is_channel_zero() {
        let freqs = RegulatoryDomain::Au915.frequencies();
        let seq = HopSequence::generate(&identity(), &freqs);
        assert_eq!(seq.order()[0], 0);
        assert_eq!(seq.initial_frequency(), freqs[0]);
    }

    #[test]
    fn test_different_seeds_give_different_orders() {
        let freqs = RegulatoryDomain::Fcc915.frequencies();
        let a = HopSequence::from_seed(1, &freqs);
        let b = HopSequence::from_seed(2, &freqs);
        assert_ne!(a.order(), b.order());
    }

    #[test]
    fn test_single_channel_set() {
        let seq = HopSequence::from_seed(42, &[433_000_000]);
        assert_eq!(seq.order(), &[0]);
    }

    // ==================== Navigation ====================

    #[test]
    fn test_advance_wraps_and_visits_every_channel() {
        let freqs = RegulatoryDomain::Eu868.frequencies();
        let mut seq = HopSequence::generate(&identity(), &freqs);

        let mut seen = HashSet::new();
        seen.insert(seq.current_frequency());
        for _ in 1..seq.len() {
            seen.insert(seq.advance());
        }
        assert_eq!(seen.len(), freqs.len());

        // One more hop wraps back to the start
        assert_eq!(seq.advance(), seq.initial_frequency());
        assert_eq!(seq.index(), 0);
    }

    #[test]
    fn test_set_index_is_modulo_length() {
        let freqs = RegulatoryDomain::Au433.frequencies();
        let mut seq = HopSequence::generate(&identity(), &freqs);
        seq.set_index(7);
        assert_eq!(seq.index(), 1);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let freqs = RegulatoryDomain::Au915.frequencies();
        let mut seq = HopSequence::generate(&identity(), &freqs);
        seq.advance();
        seq.advance();
        seq.reset();
        assert_eq!(seq.index(), 0);
        assert_eq!(seq.current_frequency(), seq.initial_frequency());
    }

    #[test]
    fn test_domain_channel_counts() {
        assert_eq!(RegulatoryDomain::Au915.frequencies().len(), 20);
        assert_eq!(RegulatoryDomain::Fcc915.frequencies().len(), 40);
        assert_eq!(RegulatoryDomain::Eu868.frequencies().len(), 13);
        assert_eq!(RegulatoryDomain::Eu433.frequencies().len(), 3);
        assert_eq!(*RegulatoryDomain::Fcc915.frequencies().last().unwrap(), 926_900_000);
    }
}
