//! # Host Bench
//!
//! Runs the link engine off-target against a simulated transmitter.
//!
//! This module handles:
//! - A transmitter that follows the same hop and slot schedule
//! - A radio that only hears the transmitter on the right channel and rate
//! - A tick timer that honours the engine's phase shifts
//! - An event stepper usable in real time or in virtual time

pub mod radio;
pub mod timer;
pub mod transmitter;

use serde::Serialize;
use tracing::trace;

use crate::engine::{LinkEngine, LinkSettings};
use crate::hal::{Clock, FlightController, StatusIndicator};

pub use radio::SimRadio;
pub use timer::{MonotonicClock, SimTimer};
pub use transmitter::{SimTransmitter, Transmission};

/// What happened on the simulated air so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BenchCounters {
    /// Transmitter slots elapsed
    pub slots: u64,
    /// Frames the receiver demodulated
    pub delivered: u64,
    /// Frames deliberately dropped
    pub dropped: u64,
    /// Frames sent while the receiver was elsewhere
    pub unheard: u64,
    /// Telemetry replies sent by the receiver
    pub uplinks: u64,
}

/// Engine, transmitter and simulated hardware wired together.
pub struct Bench<C, F, S> {
    engine: LinkEngine<SimRadio, SimTimer, C, F, S>,
    radio: SimRadio,
    timer: SimTimer,
    clock: C,
    transmitter: SimTransmitter,
    tx_next_us: u64,
    tx_interval_us: u64,
    drop_every: u64,
    counters: BenchCounters,
}

impl<C, F, S> Bench<C, F, S>
where
    C: Clock + Clone,
    F: FlightController,
    S: StatusIndicator,
{
    /// Builds and starts the engine. The transmitter's first slot is one
    /// interval from now.
    #[must_use]
    pub fn new(
        settings: LinkSettings,
        transmitter: SimTransmitter,
        radio: SimRadio,
        clock: C,
        fc: F,
        led: S,
    ) -> Self {
        let now = clock.micros();
        let timer = SimTimer::new(now);
        let mut engine =
            LinkEngine::new(settings, radio.clone(), timer.clone(), clock.clone(), fc, led);
        engine.start();

        let tx_interval_us = u64::from(transmitter.profile().frame_interval_us.max(1));
        Self {
            engine,
            radio,
            timer,
            clock,
            transmitter,
            tx_next_us: now + tx_interval_us,
            tx_interval_us,
            drop_every: 0,
            counters: BenchCounters::default(),
        }
    }

    /// Delays the transmitter's slot grid relative to the receiver's.
    #[must_use]
    pub fn with_tx_phase_offset(mut self, offset_us: u64) -> Self {
        self.tx_next_us += offset_us;
        self
    }

    /// Drops every `n`th transmitter slot (0 disables).
    #[must_use]
    pub fn with_drop_every(mut self, n: u32) -> Self {
        self.drop_every = u64::from(n);
        self
    }

    /// Time of the earliest pending event.
    #[must_use]
    pub fn next_event_at(&self) -> u64 {
        self.timer.next_tick_at().min(self.tx_next_us)
    }

    /// Fires every tick and transmitter slot due at the current time, in order.
    pub fn step(&mut self) {
        let now = self.clock.micros();
        loop {
            let tick_at = self.timer.next_tick_at();
            let tx_at = self.tx_next_us;
            if tick_at.min(tx_at) > now {
                break;
            }

            if tick_at <= tx_at {
                self.timer.mark_tick(tick_at);
                self.engine.on_tick();
                if self.radio.take_uplink().is_some() {
                    self.counters.uplinks += 1;
                    self.engine.on_transmit_done();
                }
            } else {
                self.tx_next_us += self.tx_interval_us;
                self.transmit_slot();
            }
        }
    }

    fn transmit_slot(&mut self) {
        let slot = self.counters.slots;
        self.counters.slots += 1;

        let Some(tx) = self.transmitter.next_slot() else {
            return;
        };

        if self.drop_every != 0 && slot % self.drop_every == 0 {
            self.counters.dropped += 1;
            trace!("Dropping slot {} (nonce {})", slot, tx.nonce);
        } else if self.radio.hears(&tx) {
            self.counters.delivered += 1;
            self.engine.on_frame_received(&tx.frame);
        } else {
            self.counters.unheard += 1;
        }
    }

    #[must_use]
    pub fn engine(&self) -> &LinkEngine<SimRadio, SimTimer, C, F, S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LinkEngine<SimRadio, SimTimer, C, F, S> {
        &mut self.engine
    }

    #[must_use]
    pub fn transmitter_mut(&mut self) -> &mut SimTransmitter {
        &mut self.transmitter
    }

    #[must_use]
    pub fn counters(&self) -> BenchCounters {
        self.counters
    }
}
