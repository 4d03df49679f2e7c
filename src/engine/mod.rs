//! # Link Engine
//!
//! Owns the whole receiver link: current air rate, connection state, hop
//! position, nonce, lock loop and link quality. The platform drives it through
//! four entry points and nothing else mutates it:
//!
//! | Entry point | Trigger |
//! |-------------|---------|
//! | [`LinkEngine::on_tick`] | Tick timer, once per frame interval |
//! | [`LinkEngine::on_frame_received`] | Radio receive-done |
//! | [`LinkEngine::on_transmit_done`] | Radio transmit-done |
//! | [`LinkEngine::poll`] | Cooperative main loop |
//!
//! The platform must not run two entry points concurrently. Handlers never
//! block or allocate.
//!
//! ## Slot Timing
//!
//! The transmitter sends one frame per interval, stamping it with the nonce
//! of that slot. The tick that opens a slot first hops (when the slot is on a
//! hop boundary), then opens a link quality slot, then sends the telemetry
//! reply if this is an uplink slot, and finally increments the nonce.

pub mod state;

use tracing::{debug, info, trace};

use crate::crsf::protocol::*;
use crate::fhss::{HopSequence, RegulatoryDomain};
use crate::filter::LowPassFilter;
use crate::hal::{Clock, FlightController, Radio, StatusIndicator, TickTimer};
use crate::identity::DeviceIdentity;
use crate::link_quality::LinkQuality;
use crate::lock_loop::{LockLoop, LockLoopConfig};
use crate::rates::{default_air_rates, AirRateProfile};
use crate::rf::{
    ChannelResolution, FrameCodec, ParsedFrame, RawFrame, RcData, SwitchData, SyncData,
    TelemetryReply,
};

pub use state::{DecodeStats, LinkState, LinkStatus};

/// Smoothing exponent of the uplink RSSI filter.
const RSSI_FILTER_BETA: u32 = 5;

/// Added to the smoothed RSSI (dBm) before it is reported.
const RSSI_REPORT_OFFSET: i32 = 130;

/// Default link statistics push period.
pub const DEFAULT_LINK_STATS_INTERVAL_MS: u32 = 100;

/// Everything the engine needs at boot.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub identity: DeviceIdentity,
    /// Channel centre frequencies, in channel index order
    pub frequencies: Vec<u32>,
    pub sync_word: u8,
    /// Air rate table; an empty table falls back to the built-in one
    pub rates: Vec<AirRateProfile>,
    /// Index into `rates` used at start
    pub initial_rate: usize,
    pub resolution: ChannelResolution,
    /// Drive aux channels 4-7 from the RC_DATA one-bit switches
    pub one_bit_switches: bool,
    pub link_stats_interval_ms: u32,
    pub lock_loop: LockLoopConfig,
}

impl LinkSettings {
    /// Settings with the built-in rate table and default tunables.
    #[must_use]
    pub fn new(identity: DeviceIdentity, domain: RegulatoryDomain) -> Self {
        Self {
            identity,
            frequencies: domain.frequencies(),
            sync_word: 0x12,
            rates: default_air_rates(),
            initial_rate: 0,
            resolution: ChannelResolution::default(),
            one_bit_switches: false,
            link_stats_interval_ms: DEFAULT_LINK_STATS_INTERVAL_MS,
            lock_loop: LockLoopConfig::default(),
        }
    }
}

/// Receiver link engine, generic over its hardware collaborators.
pub struct LinkEngine<R, T, C, F, S> {
    radio: R,
    timer: T,
    clock: C,
    fc: F,
    led: S,

    codec: FrameCodec,
    identity: DeviceIdentity,
    sync_word: u8,
    rates: Vec<AirRateProfile>,
    one_bit_switches: bool,
    link_stats_interval_ms: u64,

    // Written by `set_rate` (start, poll scan)
    rate_index: usize,
    // Written by poll
    scan_index: usize,
    rate_cycled_at_ms: u64,
    next_link_stats_ms: u64,
    scan_suspended: bool,

    // Written by on_frame_received (SYNC) and poll (timeout)
    state: LinkState,
    // Incremented by on_tick, overwritten by SYNC/SWITCH_DATA
    nonce: u8,
    // Advanced by on_tick or on_frame_received, reset on disconnect and rate change
    hop: HopSequence,
    // Set by on_frame_received, cleared by on_tick
    hop_preempted: bool,

    lock_loop: LockLoop,
    // Slot opened by on_tick, hit marked by on_frame_received and telemetry
    lq: LinkQuality,
    // Snapshot of `lq`, refreshed on hop boundaries
    link_quality: u8,
    rssi_filter: LowPassFilter,
    channels: RcChannels,
    link_stats: LinkStatistics,
    last_valid_frame_us: u64,
    decode_stats: DecodeStats,
}

impl<R, T, C, F, S> LinkEngine<R, T, C, F, S>
where
    R: Radio,
    T: TickTimer,
    C: Clock,
    F: FlightController,
    S: StatusIndicator,
{
    /// Creates an engine in the Disconnected state. No collaborator is
    /// touched until [`start`](Self::start).
    #[must_use]
    pub fn new(settings: LinkSettings, radio: R, timer: T, clock: C, fc: F, led: S) -> Self {
        let rates = if settings.rates.is_empty() {
            default_air_rates()
        } else {
            settings.rates
        };
        let rate_index = settings.initial_rate.min(rates.len() - 1);

        Self {
            radio,
            timer,
            clock,
            fc,
            led,
            codec: FrameCodec::new(&settings.identity, settings.resolution),
            identity: settings.identity,
            sync_word: settings.sync_word,
            one_bit_switches: settings.one_bit_switches,
            link_stats_interval_ms: u64::from(settings.link_stats_interval_ms),
            hop: HopSequence::generate(&settings.identity, &settings.frequencies),
            lock_loop: LockLoop::new(&settings.lock_loop),
            rates,
            rate_index,
            scan_index: rate_index,
            rate_cycled_at_ms: 0,
            next_link_stats_ms: 0,
            scan_suspended: false,
            state: LinkState::Disconnected,
            nonce: 0,
            hop_preempted: false,
            lq: LinkQuality::new(),
            link_quality: 0,
            rssi_filter: LowPassFilter::new(RSSI_FILTER_BETA),
            channels: [CRSF_CHANNEL_VALUE_MID; CRSF_NUM_CHANNELS],
            link_stats: LinkStatistics::default(),
            last_valid_frame_us: 0,
            decode_stats: DecodeStats::default(),
        }
    }

    /// Configures the radio and timer for the initial rate and starts
    /// listening on the initial channel.
    pub fn start(&mut self) {
        self.set_rate(self.rate_index);
        self.led.set_link_up(false);
        self.rate_cycled_at_ms = self.clock.millis();
        info!(
            "Link engine started: id {}, address {}, {} channels, {} Hz",
            self.identity,
            self.codec.address(),
            self.hop.len(),
            self.profile().rate_hz
        );
    }

    /// Tick timer entry point.
    pub fn on_tick(&mut self) {
        if self.hop_preempted {
            self.hop_preempted = false;
        } else {
            self.handle_hop();
        }

        self.lq.advance();
        self.handle_telemetry();
        self.nonce = self.nonce.wrapping_add(1);
    }

    /// Radio receive-done entry point.
    pub fn on_frame_received(&mut self, bytes: &RawFrame) {
        let now_us = self.clock.micros();

        let frame = match self.codec.decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.decode_stats.record_error(&e);
                trace!("Dropped frame: {}", e);
                return;
            }
        };

        self.decode_stats.record_accepted();
        self.last_valid_frame_us = now_us;
        self.update_link_info();

        match frame {
            ParsedFrame::RcData(rc) => self.handle_rc_data(&rc),
            ParsedFrame::SwitchData(sw) => self.handle_switch_data(&sw),
            ParsedFrame::Sync(sync) => self.handle_sync(&sync, now_us / 1000),
            ParsedFrame::Telemetry(_) => {}
        }

        self.lq.mark_hit();

        let profile = *self.profile();
        let shift = self.lock_loop.phase_shift(
            now_us,
            self.timer.last_callback_micros(),
            profile.frame_interval_us,
        );
        self.timer.phase_shift(shift);

        // One hop and one correction step per boundary slot
        if profile.is_hop_slot(self.nonce) && !self.hop_preempted {
            let correction = self.lock_loop.update_frequency(self.radio.frequency_error());
            self.radio.set_frequency_correction(correction);
            self.handle_hop();
            self.hop_preempted = true;
        }
    }

    /// Radio transmit-done entry point.
    pub fn on_transmit_done(&mut self) {
        self.radio.begin_receive();
    }

    /// Cooperative loop: rate scan, connection timeout, link statistics.
    pub fn poll(&mut self) {
        let now_us = self.clock.micros();
        let now_ms = now_us / 1000;
        let profile = *self.profile();

        let grace = if self.state == LinkState::Tentative {
            u64::from(profile.tentative_grace_ms)
        } else {
            0
        };
        if now_ms > self.rate_cycled_at_ms + u64::from(profile.scan_dwell_ms) + grace {
            if self.state.is_disconnected() && !self.scan_suspended {
                self.scan_next_rate();
            }
            self.rate_cycled_at_ms = now_ms;
        }

        let timeout_us = u64::from(profile.connection_timeout_ms) * 1000;
        if !self.state.is_disconnected() && now_us > self.last_valid_frame_us + timeout_us {
            self.enter_disconnected();
        }

        if !self.state.is_disconnected() && now_ms >= self.next_link_stats_ms {
            self.fc.send_link_statistics(&self.link_stats);
            self.next_link_stats_ms = now_ms + self.link_stats_interval_ms;
        }
    }

    /// Stops or resumes the rate scan while disconnected.
    pub fn set_scan_suspended(&mut self, suspended: bool) {
        if self.scan_suspended != suspended {
            info!("Rate scan {}", if suspended { "suspended" } else { "resumed" });
        }
        self.scan_suspended = suspended;
    }

    /// Snapshot for logging.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        let profile = self.profile();
        LinkStatus {
            state: self.state,
            rate_id: profile.id,
            rate_hz: profile.rate_hz,
            nonce: self.nonce,
            hop_index: self.hop.index(),
            frequency_hz: self.hop.current_frequency(),
            link_quality: self.link_quality,
            uplink_rssi: self.link_stats.uplink_rssi_1,
            uplink_snr: self.link_stats.uplink_snr,
            phase_offset_us: self.lock_loop.offset_us(),
            frequency_correction: self.lock_loop.frequency_correction(),
            scan_suspended: self.scan_suspended,
            decode: self.decode_stats,
        }
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        self.state
    }

    #[must_use]
    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    #[must_use]
    pub fn hop_index(&self) -> u8 {
        self.hop.index()
    }

    /// Air rate profile currently in use.
    #[must_use]
    pub fn current_rate(&self) -> &AirRateProfile {
        self.profile()
    }

    /// Live link quality of the window, not the hop-boundary snapshot.
    #[must_use]
    pub fn window_quality(&self) -> u8 {
        self.lq.quality()
    }

    #[must_use]
    pub fn decode_stats(&self) -> &DecodeStats {
        &self.decode_stats
    }

    /// Last channel values handed to the flight controller.
    #[must_use]
    pub fn channels(&self) -> &RcChannels {
        &self.channels
    }

    fn profile(&self) -> &AirRateProfile {
        &self.rates[self.rate_index]
    }

    // ==================== Frame Handling ====================

    fn handle_rc_data(&mut self, rc: &RcData) {
        self.channels[..rc.channels.len()].copy_from_slice(&rc.channels);
        if self.one_bit_switches {
            for (offset, &bit) in rc.aux_bits.iter().enumerate() {
                self.channels[CRSF_FIRST_SWITCH_CHANNEL + offset] = bit_to_crsf(bit);
            }
        }
        self.fc.send_rc_channels(&self.channels);
    }

    fn handle_switch_data(&mut self, sw: &SwitchData) {
        for (offset, &value) in sw.switches.iter().enumerate() {
            self.channels[CRSF_FIRST_SWITCH_CHANNEL + offset] = switch3b_to_crsf(value);
        }
        self.nonce = sw.nonce;
        self.hop.set_index(sw.hop_index);
        self.fc.send_rc_channels(&self.channels);
    }

    fn handle_sync(&mut self, sync: &SyncData, now_ms: u64) {
        if sync.uid_suffix != self.identity.suffix() {
            self.decode_stats.foreign_sync = self.decode_stats.foreign_sync.wrapping_add(1);
            debug!("Ignoring SYNC from foreign transmitter {:02X?}", sync.uid_suffix);
            return;
        }

        if sync.rate_id != self.profile().id {
            debug!(
                "SYNC reports rate {} while running rate {}",
                sync.rate_id,
                self.profile().id
            );
        }

        let prediction_matches = self.nonce == sync.nonce && self.hop.index() == sync.hop_index;
        match self.state.after_sync(prediction_matches) {
            LinkState::Tentative if self.state.is_disconnected() => self.enter_tentative(),
            LinkState::Connected if !self.state.is_connected() => self.enter_connected(now_ms),
            _ => {}
        }

        self.hop.set_index(sync.hop_index);
        self.nonce = sync.nonce;

        // An early hop already taken in this slot restarts from the SYNC's index
        if self.hop_preempted {
            let frequency = if self.profile().is_hop_slot(sync.nonce) {
                self.hop.advance()
            } else {
                self.hop_preempted = false;
                self.hop.current_frequency()
            };
            self.radio.set_frequency(frequency);
            self.radio.begin_receive();
        }
    }

    /// Refreshes RSSI and link quality in the outgoing channel and statistics data.
    fn update_link_info(&mut self) {
        let rssi = self.radio.last_rssi();

        self.channels[CRSF_RSSI_CHANNEL] = uint10_to_crsf(rssi_dbm_to_uint10(rssi));
        self.channels[CRSF_LQ_CHANNEL] = uint10_to_crsf(link_quality_to_uint10(self.link_quality));

        let smoothed = self.rssi_filter.update(i32::from(rssi)) + RSSI_REPORT_OFFSET;
        self.link_stats.uplink_rssi_1 = smoothed.clamp(0, i32::from(u8::MAX)) as u8;
        self.link_stats.uplink_snr = self.radio.last_snr();
        self.link_stats.uplink_lq = self.link_quality;
        self.link_stats.rf_mode = self.profile().id;
    }

    // ==================== Tick Handling ====================

    fn handle_hop(&mut self) {
        if !self.profile().is_hop_slot(self.nonce) {
            return;
        }

        self.link_quality = self.lq.quality();
        if self.state.is_disconnected() {
            return;
        }

        let frequency = self.hop.advance();
        self.radio.set_frequency(frequency);
        self.radio.begin_receive();
        trace!("Hop to index {} ({} Hz)", self.hop.index(), frequency);
    }

    fn handle_telemetry(&mut self) {
        if !self.state.is_connected() || !self.profile().is_telemetry_slot(self.nonce) {
            return;
        }

        let reply = TelemetryReply {
            uplink_rssi: self.link_stats.uplink_rssi_1,
            uplink_snr: self.link_stats.uplink_snr,
            link_quality: self.link_stats.uplink_lq,
            battery_voltage: 0,
        };
        let frame = self.codec.encode_telemetry_reply(&reply);
        self.radio.transmit(&frame);
        self.lq.mark_hit();
    }

    // ==================== Rate Scan ====================

    fn scan_next_rate(&mut self) {
        self.scan_index = (self.scan_index + 1) % self.rates.len();
        self.set_rate(self.scan_index);
        self.led.toggle();
        debug!(
            "Scanning rate {} ({} Hz)",
            self.profile().id,
            self.profile().rate_hz
        );
    }

    fn set_rate(&mut self, index: usize) {
        self.rate_index = index % self.rates.len();
        let profile = *self.profile();

        self.radio.stop_receive();
        self.hop.reset();
        self.radio
            .configure(&profile.modulation, self.hop.initial_frequency(), self.sync_word);
        self.timer.set_interval(profile.frame_interval_us);
        self.lock_loop.reset_phase();
        self.lq.reset();
        self.radio.begin_receive();
    }

    // ==================== State Entry Actions ====================

    fn enter_tentative(&mut self) {
        self.state = LinkState::Tentative;
        info!("Tentative sync at {} Hz", self.profile().rate_hz);
    }

    fn enter_connected(&mut self, now_ms: u64) {
        self.state = LinkState::Connected;
        self.rate_cycled_at_ms = now_ms;
        self.next_link_stats_ms = now_ms;
        self.led.set_link_up(true);
        info!(
            "Link up at {} Hz (nonce {}, hop index {})",
            self.profile().rate_hz,
            self.nonce,
            self.hop.index()
        );
    }

    fn enter_disconnected(&mut self) {
        if self.state.is_disconnected() {
            return;
        }

        let previous = self.state;
        self.state = LinkState::Disconnected;
        self.lock_loop.reset();
        self.radio
            .set_frequency_correction(self.lock_loop.frequency_correction());
        self.hop.reset();
        self.hop_preempted = false;

        let frequency = self.hop.initial_frequency();
        self.radio.set_frequency(frequency);
        self.radio.begin_receive();
        self.led.set_link_up(false);
        info!("Link lost (was {}), listening on {} Hz", previous, frequency);
    }
}
