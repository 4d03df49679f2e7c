//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section except `[lock_loop]` and `[simulation]` must be present,
//! though each field inside has a default.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::engine::{LinkSettings, DEFAULT_LINK_STATS_INTERVAL_MS};
use crate::error::{LinkError, Result};
use crate::fhss::RegulatoryDomain;
use crate::identity::DeviceIdentity;
use crate::lock_loop::LockLoopConfig;
use crate::rates::{default_air_rates, AirRateProfile};
use crate::rf::ChannelResolution;

/// Longest accepted frame interval (10 Hz)
pub const MAX_FRAME_INTERVAL_US: u32 = 100_000;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub identity: IdentityConfig,
    pub radio: RadioConfig,
    pub link: LinkConfig,
    #[serde(default)]
    pub lock_loop: LockLoopConfig,
    pub serial: SerialConfig,
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Binding identity
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    /// Six identity bytes shared with the transmitter
    pub uid: DeviceIdentity,
}

/// Radio configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    #[serde(default = "default_regulatory_domain")]
    pub regulatory_domain: RegulatoryDomain,

    #[serde(default = "default_sync_word")]
    pub sync_word: u8,
}

/// Link engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Index into `rates` to start scanning from
    #[serde(default)]
    pub initial_rate: usize,

    #[serde(default)]
    pub channel_resolution: ChannelResolution,

    #[serde(default)]
    pub one_bit_switches: bool,

    #[serde(default = "default_link_stats_interval_ms")]
    pub link_stats_interval_ms: u32,

    /// Air rate table, fastest first
    #[serde(default = "default_air_rates")]
    pub rates: Vec<AirRateProfile>,
}

/// Flight controller serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_enabled")]
    pub enabled: bool,

    /// Device path, empty to auto-detect
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,

    /// Also write tracing output to a daily file under `log_dir`
    #[serde(default)]
    pub trace_to_file: bool,
}

/// Bench transmitter used when no radio hardware is attached
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Index into `link.rates` the transmitter runs at
    #[serde(default)]
    pub tx_rate: usize,

    /// Delay of the transmitter's slot grid relative to the receiver's
    #[serde(default = "default_tx_phase_offset_us")]
    pub tx_phase_offset_us: u64,

    #[serde(default)]
    pub carrier_offset_hz: i32,

    /// Drop every Nth transmitter slot, 0 keeps all
    #[serde(default)]
    pub drop_every: u32,

    #[serde(default = "default_rssi_dbm")]
    pub rssi_dbm: i8,

    #[serde(default = "default_snr_db")]
    pub snr_db: i8,

    /// Analog stick values sent by the transmitter
    #[serde(default = "default_sticks")]
    pub sticks: [u16; 4],

    /// 3-bit switch positions sent by the transmitter
    #[serde(default)]
    pub switches: [u8; 4],
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tx_rate: 0,
            tx_phase_offset_us: default_tx_phase_offset_us(),
            carrier_offset_hz: 0,
            drop_every: 0,
            rssi_dbm: default_rssi_dbm(),
            snr_db: default_snr_db(),
            sticks: default_sticks(),
            switches: [0; 4],
        }
    }
}

// Default value functions
fn default_regulatory_domain() -> RegulatoryDomain { RegulatoryDomain::Fcc915 }
fn default_sync_word() -> u8 { 0x12 }

fn default_link_stats_interval_ms() -> u32 { DEFAULT_LINK_STATS_INTERVAL_MS }

fn default_serial_enabled() -> bool { false }
fn default_serial_port() -> String { "/dev/ttyAMA0".to_string() }
fn default_baud_rate() -> u32 { 420000 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }
fn default_log_format() -> String { "jsonl".to_string() }

fn default_tx_phase_offset_us() -> u64 { 1700 }
fn default_rssi_dbm() -> i8 { -70 }
fn default_snr_db() -> i8 { 8 }
fn default_sticks() -> [u16; 4] { [992; 4] }

fn invalid(message: impl std::fmt::Display) -> LinkError {
    LinkError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_link_rx::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Boot settings for the link engine.
    #[must_use]
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            identity: self.identity.uid,
            frequencies: self.radio.regulatory_domain.frequencies(),
            sync_word: self.radio.sync_word,
            rates: self.link.rates.clone(),
            initial_rate: self.link.initial_rate,
            resolution: self.link.channel_resolution,
            one_bit_switches: self.link.one_bit_switches,
            link_stats_interval_ms: self.link.link_stats_interval_ms,
            lock_loop: self.lock_loop,
        }
    }

    /// Rate profile the bench transmitter runs at.
    #[must_use]
    pub fn transmitter_rate(&self) -> AirRateProfile {
        self.link.rates[self.simulation.tx_rate]
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate rate table
        if self.link.rates.is_empty() {
            return Err(invalid("link.rates cannot be empty"));
        }

        for (index, rate) in self.link.rates.iter().enumerate() {
            if rate.rate_hz == 0 || rate.frame_interval_us == 0 {
                return Err(invalid(format!(
                    "rate {} must have a non-zero rate_hz and frame_interval_us",
                    index
                )));
            }

            if rate.frame_interval_us > MAX_FRAME_INTERVAL_US {
                return Err(invalid(format!(
                    "rate {} frame_interval_us must be at most {}",
                    index, MAX_FRAME_INTERVAL_US
                )));
            }

            if rate.hop_interval == 0 {
                return Err(invalid(format!("rate {} hop_interval must be greater than 0", index)));
            }

            if !(5..=12).contains(&rate.modulation.spreading_factor) {
                return Err(invalid(format!("rate {} spreading_factor must be between 5 and 12", index)));
            }

            if rate.connection_timeout_ms == 0 || rate.scan_dwell_ms == 0 {
                return Err(invalid(format!(
                    "rate {} connection_timeout_ms and scan_dwell_ms must be greater than 0",
                    index
                )));
            }

            if self.link.rates[..index].iter().any(|r| r.id == rate.id) {
                return Err(invalid(format!("rate id {} appears more than once", rate.id)));
            }
        }

        if self.link.initial_rate >= self.link.rates.len() {
            return Err(invalid("initial_rate must index into link.rates"));
        }

        if self.link.link_stats_interval_ms == 0 || self.link.link_stats_interval_ms > 60000 {
            return Err(invalid("link_stats_interval_ms must be between 1 and 60000"));
        }

        // Validate lock loop
        if self.lock_loop.correction_step <= 0 {
            return Err(invalid("correction_step must be greater than 0"));
        }

        if self.lock_loop.correction_min > 0 || self.lock_loop.correction_max < 0 {
            return Err(invalid("correction range must include 0"));
        }

        // Validate serial port configuration
        if ![115200, 400000, 420000, 921600, 1870000, 3750000].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 115200, 400000, 420000, 921600, 1870000, 3750000",
            ));
        }

        // Validate telemetry configuration
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.trace_to_file && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when trace_to_file is set"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        // Validate bench transmitter
        if self.simulation.tx_rate >= self.link.rates.len() {
            return Err(invalid("simulation tx_rate must index into link.rates"));
        }

        if self.simulation.rssi_dbm > 0 {
            return Err(invalid("simulation rssi_dbm must not be positive"));
        }

        if self.simulation.switches.iter().any(|&s| s > 7) {
            return Err(invalid("simulation switches must be between 0 and 7"));
        }

        if self.simulation.sticks.iter().any(|&s| s > 2047) {
            return Err(invalid("simulation sticks must be between 0 and 2047"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[identity]
uid = [1, 2, 3, 4, 5, 6]

[radio]

[link]

[serial]

[telemetry]
"#;

    fn create_valid_config() -> Config {
        toml::from_str(MINIMAL).unwrap()
    }

    // ==================== Loading ====================

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.identity.uid, DeviceIdentity::new([1, 2, 3, 4, 5, 6]));
        assert_eq!(config.radio.regulatory_domain, RegulatoryDomain::Fcc915);
        assert_eq!(config.radio.sync_word, 0x12);
        assert_eq!(config.link.rates, default_air_rates());
        assert_eq!(config.link.channel_resolution, ChannelResolution::Bits11);
        assert_eq!(config.lock_loop, LockLoopConfig::default());
        assert!(!config.serial.enabled);
        assert_eq!(config.simulation.tx_phase_offset_us, 1700);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(MINIMAL.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/fpv-link-rx.toml");
        assert!(matches!(result, Err(LinkError::Io(_))));
    }

    #[test]
    fn test_missing_identity_is_rejected() {
        let toml = "[radio]\n[link]\n[serial]\n[telemetry]\n";
        assert!(matches!(Config::parse(toml), Err(LinkError::Config(_))));
    }

    #[test]
    fn test_full_config_parses() {
        let toml = r#"
[identity]
uid = [0xDE, 0xAD, 0xBE, 0xEF, 0x42, 0x17]

[radio]
regulatory_domain = "au915"
sync_word = 0x34

[link]
initial_rate = 1
channel_resolution = "10bit"
one_bit_switches = true
link_stats_interval_ms = 200

[[link.rates]]
id = 0
rate_hz = 150
frame_interval_us = 6666
hop_interval = 4
telemetry_ratio = 32
connection_timeout_ms = 1000
scan_dwell_ms = 1500
tentative_grace_ms = 1000
modulation = { bandwidth = "khz500", spreading_factor = 6, coding_rate = "cr4_5", preamble_len = 8 }

[[link.rates]]
id = 1
rate_hz = 25
frame_interval_us = 40000
hop_interval = 2
telemetry_ratio = 8
connection_timeout_ms = 6000
scan_dwell_ms = 3000
tentative_grace_ms = 6000
modulation = { bandwidth = "khz250", spreading_factor = 9, coding_rate = "cr4_7", preamble_len = 10 }

[lock_loop]
correction_step = 30
phase_bias_us = -20

[serial]
enabled = true
port = ""

[telemetry]
enabled = false

[simulation]
tx_rate = 1
carrier_offset_hz = -4000
drop_every = 10
switches = [1, 0, 5, 7]
"#;
        let config = Config::parse(toml).unwrap();
        let settings = config.link_settings();

        assert_eq!(settings.frequencies, RegulatoryDomain::Au915.frequencies());
        assert_eq!(settings.sync_word, 0x34);
        assert_eq!(settings.rates.len(), 2);
        assert_eq!(settings.rates[0].hop_interval, 4);
        assert_eq!(settings.initial_rate, 1);
        assert_eq!(settings.resolution, ChannelResolution::Bits10);
        assert!(settings.one_bit_switches);
        assert_eq!(settings.link_stats_interval_ms, 200);
        assert_eq!(settings.lock_loop.correction_step, 30);
        assert_eq!(settings.lock_loop.correction_max, 100_000);
        assert_eq!(settings.lock_loop.phase_bias_us, -20);

        assert_eq!(config.transmitter_rate().rate_hz, 25);
        assert!(config.serial.port.is_empty());
        assert_eq!(config.simulation.switches, [1, 0, 5, 7]);
    }

    // ==================== Validation ====================

    #[test]
    fn test_default_config_is_valid() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_rate_table() {
        let mut config = create_valid_config();
        config.link.rates.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_hop_interval() {
        let mut config = create_valid_config();
        config.link.rates[1].hop_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_frame_interval() {
        let mut config = create_valid_config();
        config.link.rates[0].frame_interval_us = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_interval_upper_bound() {
        let mut config = create_valid_config();
        config.link.rates[0].frame_interval_us = MAX_FRAME_INTERVAL_US;
        assert!(config.validate().is_ok());

        config.link.rates[0].frame_interval_us = 20_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spreading_factor_out_of_range() {
        let mut config = create_valid_config();
        config.link.rates[2].modulation.spreading_factor = 13;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_rate_id() {
        let mut config = create_valid_config();
        config.link.rates[2].id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_telemetry_ratio_is_allowed() {
        let mut config = create_valid_config();
        config.link.rates[0].telemetry_ratio = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_initial_rate_out_of_range() {
        let mut config = create_valid_config();
        config.link.initial_rate = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_link_stats_interval_zero() {
        let mut config = create_valid_config();
        config.link.link_stats_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_link_stats_interval_too_high() {
        let mut config = create_valid_config();
        config.link.link_stats_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_correction_step_zero() {
        let mut config = create_valid_config();
        config.lock_loop.correction_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_correction_range_excludes_zero() {
        let mut config = create_valid_config();
        config.lock_loop.correction_min = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 9600; // Not in the allowed list
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[115200, 400000, 420000, 921600, 1870000, 3750000] {
            let mut config = create_valid_config();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_log_dir_with_trace_file() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.trace_to_file = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_interval_zero() {
        let mut config = create_valid_config();
        config.telemetry.log_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = create_valid_config();
        config.telemetry.format = "csv".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_rate_out_of_range() {
        let mut config = create_valid_config();
        config.simulation.tx_rate = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_positive_rssi() {
        let mut config = create_valid_config();
        config.simulation.rssi_dbm = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_switch_out_of_range() {
        let mut config = create_valid_config();
        config.simulation.switches = [0, 8, 0, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_stick_out_of_range() {
        let mut config = create_valid_config();
        config.simulation.sticks = [992, 992, 2048, 992];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_regulatory_domain(), RegulatoryDomain::Fcc915);
        assert_eq!(default_sync_word(), 0x12);
        assert_eq!(default_link_stats_interval_ms(), 100);
        assert!(!default_serial_enabled());
        assert_eq!(default_serial_port(), "/dev/ttyAMA0");
        assert_eq!(default_baud_rate(), 420000);
        assert!(default_telemetry_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_interval_ms(), 1000);
        assert_eq!(default_log_format(), "jsonl");
        assert_eq!(default_rssi_dbm(), -70);
    }
}
