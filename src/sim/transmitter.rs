//! # Simulated Transmitter
//!
//! Plays the transmitter's side of the slot schedule for slot `n`:
//!
//! - hops first when `n` is a multiple of the hop interval (except the very
//!   first slot),
//! - stays silent when `n` is a telemetry slot, leaving the channel to the
//!   receiver's reply,
//! - otherwise sends SYNC while on hop index 0, SWITCH_DATA every 4th slot,
//!   and RC_DATA the rest of the time.

use crate::fhss::HopSequence;
use crate::identity::DeviceIdentity;
use crate::rates::{AirRateProfile, ModulationParams};
use crate::rf::{ChannelResolution, FrameCodec, RawFrame};

/// Slots between SWITCH_DATA frames.
const SWITCH_EVERY: u8 = 4;

/// One over-the-air frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub frame: RawFrame,
    pub frequency_hz: u32,
    pub modulation: ModulationParams,
    pub nonce: u8,
}

/// Transmitter-side slot scheduler.
#[derive(Debug, Clone)]
pub struct SimTransmitter {
    codec: FrameCodec,
    suffix: [u8; 3],
    hop: HopSequence,
    profile: AirRateProfile,
    nonce: u8,
    started: bool,
    sticks: [u16; 4],
    switches: [u8; 4],
}

impl SimTransmitter {
    #[must_use]
    pub fn new(
        identity: &DeviceIdentity,
        frequencies: &[u32],
        profile: AirRateProfile,
        resolution: ChannelResolution,
    ) -> Self {
        Self {
            codec: FrameCodec::new(identity, resolution),
            suffix: identity.suffix(),
            hop: HopSequence::generate(identity, frequencies),
            profile,
            nonce: 0,
            started: false,
            sticks: [992; 4],
            switches: [0; 4],
        }
    }

    #[must_use]
    pub fn profile(&self) -> &AirRateProfile {
        &self.profile
    }

    /// Nonce of the next slot.
    #[must_use]
    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    #[must_use]
    pub fn hop_index(&self) -> u8 {
        self.hop.index()
    }

    pub fn set_sticks(&mut self, sticks: [u16; 4]) {
        self.sticks = sticks;
    }

    pub fn set_switches(&mut self, switches: [u8; 4]) {
        self.switches = switches;
    }

    /// Advances one slot. Returns `None` for slots reserved for the
    /// receiver's telemetry reply.
    pub fn next_slot(&mut self) -> Option<Transmission> {
        let n = self.nonce;
        self.nonce = n.wrapping_add(1);

        if self.started && self.profile.hop_interval != 0 && n % self.profile.hop_interval == 0 {
            self.hop.advance();
        }
        self.started = true;

        if self.profile.telemetry_ratio != 0 && n % self.profile.telemetry_ratio == 0 {
            return None;
        }

        let index = self.hop.index();
        let frame = if index == 0 {
            self.codec.encode_sync(index, n, self.profile.id, self.suffix)
        } else if n % SWITCH_EVERY == 0 {
            self.codec.encode_switch_data(&self.switches, n, index)
        } else {
            self.codec.encode_rc_data(&self.sticks, [false; 4])
        };

        Some(Transmission {
            frame,
            frequency_hz: self.hop.current_frequency(),
            modulation: self.profile.modulation,
            nonce: n,
        })
    }
}
