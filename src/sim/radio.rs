//! # Simulated Radio
//!
//! A [`Radio`] that hears a [`Transmission`] only when it is receiving on
//! the same frequency with the same modulation. The transmitter's carrier
//! offset shows up as frequency error until the engine's correction
//! cancels it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hal::Radio;
use crate::rates::ModulationParams;
use crate::rf::RawFrame;

use super::transmitter::Transmission;

/// Radio state shared between the engine's handle and the bench.
#[derive(Debug, Default)]
struct AirState {
    modulation: Option<ModulationParams>,
    frequency_hz: u32,
    receiving: bool,
    correction: i32,
    carrier_offset_hz: i32,
    rssi_dbm: i8,
    snr_db: i8,
    pending_uplink: Option<RawFrame>,
    uplink_count: u64,
}

/// Cloneable handle to one simulated transceiver.
#[derive(Debug, Clone, Default)]
pub struct SimRadio {
    air: Arc<Mutex<AirState>>,
}

impl SimRadio {
    /// Creates a radio reporting a fixed signal level.
    #[must_use]
    pub fn new(rssi_dbm: i8, snr_db: i8, carrier_offset_hz: i32) -> Self {
        let radio = Self::default();
        {
            let mut air = radio.air();
            air.rssi_dbm = rssi_dbm;
            air.snr_db = snr_db;
            air.carrier_offset_hz = carrier_offset_hz;
        }
        radio
    }

    /// Whether `tx` would be demodulated right now.
    #[must_use]
    pub fn hears(&self, tx: &Transmission) -> bool {
        let air = self.air();
        air.receiving && air.frequency_hz == tx.frequency_hz && air.modulation == Some(tx.modulation)
    }

    /// Takes the frame passed to the last `transmit`, if any.
    pub fn take_uplink(&self) -> Option<RawFrame> {
        self.air().pending_uplink.take()
    }

    /// Number of frames transmitted so far.
    #[must_use]
    pub fn uplink_count(&self) -> u64 {
        self.air().uplink_count
    }

    /// Correction currently applied to the synthesizer.
    #[must_use]
    pub fn correction(&self) -> i32 {
        self.air().correction
    }

    fn air(&self) -> MutexGuard<'_, AirState> {
        self.air.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Radio for SimRadio {
    fn configure(&mut self, modulation: &ModulationParams, frequency_hz: u32, _sync_word: u8) {
        let mut air = self.air();
        air.modulation = Some(*modulation);
        air.frequency_hz = frequency_hz;
    }

    fn set_frequency(&mut self, frequency_hz: u32) {
        self.air().frequency_hz = frequency_hz;
    }

    fn begin_receive(&mut self) {
        self.air().receiving = true;
    }

    fn stop_receive(&mut self) {
        self.air().receiving = false;
    }

    fn transmit(&mut self, frame: &RawFrame) {
        let mut air = self.air();
        air.receiving = false;
        air.pending_uplink = Some(*frame);
        air.uplink_count += 1;
    }

    fn last_rssi(&self) -> i8 {
        self.air().rssi_dbm
    }

    fn last_snr(&self) -> i8 {
        self.air().snr_db
    }

    fn frequency_error(&self) -> i32 {
        let air = self.air();
        air.carrier_offset_hz - air.correction
    }

    fn set_frequency_correction(&mut self, correction: i32) {
        self.air().correction = correction;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::DEFAULT_AIR_RATES;

    fn transmission(frequency_hz: u32) -> Transmission {
        Transmission {
            frame: [0; 8],
            frequency_hz,
            modulation: DEFAULT_AIR_RATES[0].modulation,
            nonce: 0,
        }
    }

    #[test]
    fn test_hears_only_matching_channel_and_modulation() {
        let mut radio = SimRadio::new(-70, 8, 0);
        radio.configure(&DEFAULT_AIR_RATES[0].modulation, 915_500_000, 0x12);
        assert!(!radio.hears(&transmission(915_500_000)), "not receiving yet");

        radio.begin_receive();
        assert!(radio.hears(&transmission(915_500_000)));
        assert!(!radio.hears(&transmission(916_100_000)));

        radio.configure(&DEFAULT_AIR_RATES[1].modulation, 915_500_000, 0x12);
        assert!(!radio.hears(&transmission(915_500_000)));
    }

    #[test]
    fn test_transmit_leaves_receive_until_restarted() {
        let mut radio = SimRadio::new(-70, 8, 0);
        radio.configure(&DEFAULT_AIR_RATES[0].modulation, 915_500_000, 0x12);
        radio.begin_receive();

        radio.transmit(&[7; 8]);
        assert!(!radio.hears(&transmission(915_500_000)));
        assert_eq!(radio.take_uplink(), Some([7; 8]));
        assert_eq!(radio.take_uplink(), None);
        assert_eq!(radio.uplink_count(), 1);

        radio.begin_receive();
        assert!(radio.hears(&transmission(915_500_000)));
    }

    #[test]
    fn test_correction_cancels_carrier_offset() {
        let mut radio = SimRadio::new(-70, 8, 1500);
        assert_eq!(radio.frequency_error(), 1500);
        radio.set_frequency_correction(1464);
        assert_eq!(radio.frequency_error(), 36);
        assert_eq!(radio.correction(), 1464);
    }
}
