//! # FPV Link Receiver
//!
//! Runs the receiver link engine on the host against a simulated
//! transmitter, forwarding CRSF frames to a flight controller UART.
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use fpv_link_rx::config::Config;
use fpv_link_rx::crsf::protocol::{LinkStatistics, RcChannels};
use fpv_link_rx::hal::{FlightController, StatusIndicator};
use fpv_link_rx::serial::{
    output_channel, run_writer, DiscardOutput, FcOutput, FcSerial, DEFAULT_QUEUE_DEPTH,
};
use fpv_link_rx::sim::{Bench, MonotonicClock, SimRadio, SimTransmitter};
use fpv_link_rx::telemetry::{TelemetryLogger, TelemetryRecord};

/// Used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Period of the engine's cooperative loop
const POLL_INTERVAL_MS: u64 = 1;

/// Where RC and link statistics frames go
enum FcSink {
    Serial(FcOutput),
    Discard(DiscardOutput),
}

impl FlightController for FcSink {
    fn send_rc_channels(&mut self, channels: &RcChannels) {
        match self {
            FcSink::Serial(output) => output.send_rc_channels(channels),
            FcSink::Discard(output) => output.send_rc_channels(channels),
        }
    }

    fn send_link_statistics(&mut self, stats: &LinkStatistics) {
        match self {
            FcSink::Serial(output) => output.send_link_statistics(stats),
            FcSink::Discard(output) => output.send_link_statistics(stats),
        }
    }
}

/// Status LED rendered as log lines
#[derive(Debug, Default)]
struct LogLed {
    lit: bool,
}

impl StatusIndicator for LogLed {
    fn set_link_up(&mut self, up: bool) {
        self.lit = up;
        debug!("LED {}", if up { "on" } else { "off" });
    }

    fn toggle(&mut self) {
        self.lit = !self.lit;
        trace!("LED toggled {}", if self.lit { "on" } else { "off" });
    }
}

/// Installs the console subscriber and, if configured, a daily log file.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let (file_layer, guard) = if config.telemetry.trace_to_file {
        let appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, "fpv-link-rx.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Opens the flight controller port and spawns its writer task.
fn start_serial(config: &Config) -> Result<(FcSink, Option<JoinHandle<()>>)> {
    if !config.serial.enabled {
        info!("Serial output disabled, CRSF frames are discarded");
        return Ok((FcSink::Discard(DiscardOutput), None));
    }

    let serial = if config.serial.port.is_empty() {
        FcSerial::open(config.serial.baud_rate)?
    } else {
        FcSerial::open_with_paths(&[config.serial.port.as_str()], config.serial.baud_rate)?
    };
    info!("Flight controller serial port opened at: {}", serial.device_path());

    let (output, rx) = output_channel(DEFAULT_QUEUE_DEPTH);
    let sink = serial.into_sink();
    let writer = tokio::spawn(async move {
        if let Err(e) = run_writer(sink, rx).await {
            error!("Serial writer failed: {}", e);
        }
    });

    Ok((FcSink::Serial(output), Some(writer)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_tracing(&config);
    info!("FPV link receiver v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    let (sink, writer) = start_serial(&config)?;

    let mut logger = if config.telemetry.enabled {
        Some(TelemetryLogger::new(
            &config.telemetry.log_dir,
            config.telemetry.max_records_per_file,
            config.telemetry.max_files_to_keep,
        )?)
    } else {
        None
    };

    // Bench transmitter bound to the same identity
    let settings = config.link_settings();
    let sim = &config.simulation;
    let tx_rate = config.transmitter_rate();
    let mut transmitter = SimTransmitter::new(
        &settings.identity,
        &settings.frequencies,
        tx_rate,
        settings.resolution,
    );
    transmitter.set_sticks(sim.sticks);
    transmitter.set_switches(sim.switches);
    info!(
        "Bench transmitter at {} Hz, carrier offset {} Hz",
        tx_rate.rate_hz, sim.carrier_offset_hz
    );

    let clock = MonotonicClock::new();
    let origin = Instant::from_std(clock.origin());
    let radio = SimRadio::new(sim.rssi_dbm, sim.snr_db, sim.carrier_offset_hz);
    let mut bench = Bench::new(settings, transmitter, radio, clock, sink, LogLed::default())
        .with_tx_phase_offset(sim.tx_phase_offset_us)
        .with_drop_every(sim.drop_every);

    let mut poll_timer = interval(Duration::from_millis(POLL_INTERVAL_MS));
    poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status_timer = interval(Duration::from_millis(config.telemetry.log_interval_ms));
    status_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Press Ctrl+C to exit");

    loop {
        let next_event = origin + Duration::from_micros(bench.next_event_at());

        tokio::select! {
            _ = sleep_until(next_event) => bench.step(),

            _ = poll_timer.tick() => bench.engine_mut().poll(),

            _ = status_timer.tick() => {
                let status = bench.engine().status();
                debug!(
                    "{} | {} Hz | LQ {}% | RSSI {} | SNR {} dB | hop {} | phase {} us | correction {}",
                    status.state,
                    status.rate_hz,
                    status.link_quality,
                    status.uplink_rssi,
                    status.uplink_snr,
                    status.hop_index,
                    status.phase_offset_us,
                    status.frequency_correction
                );

                if let Some(logger) = logger.as_mut() {
                    let record = TelemetryRecord::now(status).with_bench(bench.counters());
                    if let Err(e) = logger.log(&record) {
                        warn!("Failed to write telemetry record: {}", e);
                    }
                }
            }

            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutting down...");
                break;
            }
        }
    }

    let counters = bench.counters();
    let decode = *bench.engine().decode_stats();
    info!(
        "Slots {}, delivered {}, accepted {}, rejected {}, uplinks {}",
        counters.slots,
        counters.delivered,
        decode.accepted,
        decode.rejected(),
        counters.uplinks
    );

    // Closing the queue lets the writer drain and stop
    drop(bench);
    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            warn!("Serial writer task ended abnormally: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpv_link_rx::crsf::protocol::{CRSF_CHANNEL_VALUE_MID, CRSF_NUM_CHANNELS};

    #[test]
    fn test_default_config_file_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        assert!(!config.serial.enabled);
        assert_eq!(config.link.rates.len(), 3);
    }

    #[test]
    fn test_serial_sink_forwards_frames() {
        let (output, mut rx) = output_channel(4);
        let mut sink = FcSink::Serial(output);
        sink.send_rc_channels(&[CRSF_CHANNEL_VALUE_MID; CRSF_NUM_CHANNELS]);
        sink.send_link_statistics(&LinkStatistics::default());
        assert_eq!(rx.try_recv().unwrap().len(), 26);
        assert_eq!(rx.try_recv().unwrap().len(), 14);
    }

    #[test]
    fn test_log_led_tracks_state() {
        let mut led = LogLed::default();
        led.set_link_up(true);
        assert!(led.lit);
        led.toggle();
        assert!(!led.lit);
    }
}
