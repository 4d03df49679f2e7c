//! # Hardware Abstraction
//!
//! Every collaborator the link engine talks to. The engine owns one value of
//! each and never reaches hardware any other way, so the same engine runs on
//! a board, in the bench simulator, and under test.

use crate::crsf::protocol::{LinkStatistics, RcChannels};
use crate::rates::ModulationParams;
use crate::rf::RawFrame;

/// Half-duplex LoRa transceiver.
pub trait Radio {
    /// Applies modulation, centre frequency and sync word.
    fn configure(&mut self, modulation: &ModulationParams, frequency_hz: u32, sync_word: u8);

    /// Retunes without touching modulation.
    fn set_frequency(&mut self, frequency_hz: u32);

    /// Enters continuous receive.
    fn begin_receive(&mut self);

    /// Leaves receive.
    fn stop_receive(&mut self);

    /// Starts a non-blocking transmit. Completion is reported to
    /// [`LinkEngine::on_transmit_done`](crate::engine::LinkEngine::on_transmit_done).
    fn transmit(&mut self, frame: &RawFrame);

    /// RSSI of the most recent packet, dBm.
    fn last_rssi(&self) -> i8;

    /// SNR of the most recent packet, dB.
    fn last_snr(&self) -> i8;

    /// Carrier frequency error of the most recent packet, Hz.
    fn frequency_error(&self) -> i32;

    /// Applies a frequency correction to the synthesizer.
    fn set_frequency_correction(&mut self, correction: i32);
}

/// Periodic timer driving [`LinkEngine::on_tick`](crate::engine::LinkEngine::on_tick).
pub trait TickTimer {
    /// Sets the tick period.
    fn set_interval(&mut self, interval_us: u32);

    /// Moves the next tick by `delta_us` (positive: later) without
    /// changing the period.
    fn phase_shift(&mut self, delta_us: i32);

    /// Timestamp of the most recent tick, in [`Clock::micros`] time.
    fn last_callback_micros(&self) -> u64;
}

/// Monotonic time source.
pub trait Clock {
    /// Microseconds since an arbitrary epoch.
    fn micros(&self) -> u64;

    /// Milliseconds since the same epoch.
    fn millis(&self) -> u64 {
        self.micros() / 1000
    }
}

/// Output toward the flight controller.
#[cfg_attr(test, mockall::automock)]
pub trait FlightController {
    fn send_rc_channels(&mut self, channels: &RcChannels);
    fn send_link_statistics(&mut self, stats: &LinkStatistics);
}

/// Link status LED.
#[cfg_attr(test, mockall::automock)]
pub trait StatusIndicator {
    fn set_link_up(&mut self, up: bool);
    fn toggle(&mut self);
}
