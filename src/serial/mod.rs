//! # Serial Communication Module
//!
//! Carries CRSF frames from the link engine to the flight controller UART.
//!
//! This module handles:
//! - Opening the flight controller port at 420,000 baud
//! - A non-blocking [`FlightController`] that queues encoded frames
//! - An async writer task draining the queue into the port

pub mod sink;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, trace, warn};

use crate::crsf::encoder::{encode_link_statistics_frame, encode_rc_channels_frame};
use crate::crsf::protocol::{LinkStatistics, RcChannels};
use crate::error::{LinkError, Result};
use crate::hal::FlightController;

pub use sink::{FrameSink, UartSink};

/// CRSF baud rate (420,000 baud)
pub const CRSF_BAUD_RATE: u32 = 420_000;

/// Frames buffered between the engine and the writer task
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Flight controller device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyAMA0", // On-board UART
    "/dev/ttyS0",   // Mini UART
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Serial link to the flight controller.
pub struct FcSerial {
    port: tokio_serial::SerialStream,
    device_path: String,
}

impl std::fmt::Debug for FcSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl FcSerial {
    /// Open the flight controller port, trying the default paths.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::SerialPortNotFound`] if no path could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_link_rx::serial::{FcSerial, CRSF_BAUD_RATE};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let serial = FcSerial::open(CRSF_BAUD_RATE)?;
    ///     println!("Flight controller on {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate)
    }

    /// Open the flight controller port with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyAMA0"])
    /// * `baud_rate` - Line rate, normally [`CRSF_BAUD_RATE`]
    ///
    /// # Returns
    ///
    /// * `Result<FcSerial>` - The first port that opened
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Flight controller port open at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(LinkError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with CRSF line settings (8N1, no flow control)
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LinkError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    #[must_use]
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hands the port over to a writer task.
    #[must_use]
    pub fn into_sink(self) -> UartSink {
        UartSink::new(self.port)
    }
}

/// [`FlightController`] that encodes CRSF frames and queues them for the
/// writer task without blocking the caller.
#[derive(Debug, Clone)]
pub struct FcOutput {
    tx: mpsc::Sender<Bytes>,
    dropped: u64,
}

impl FcOutput {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Frames discarded because the queue was full or closed.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enqueue(&mut self, frame: Bytes) {
        if let Err(e) = self.tx.try_send(frame) {
            self.dropped += 1;
            trace!("Flight controller frame dropped: {}", e);
        }
    }
}

impl FlightController for FcOutput {
    fn send_rc_channels(&mut self, channels: &RcChannels) {
        self.enqueue(encode_rc_channels_frame(channels));
    }

    fn send_link_statistics(&mut self, stats: &LinkStatistics) {
        self.enqueue(encode_link_statistics_frame(stats));
    }
}

/// Creates a connected output and queue receiver.
#[must_use]
pub fn output_channel(depth: usize) -> (FcOutput, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (FcOutput::new(tx), rx)
}

/// [`FlightController`] that discards everything, for runs without a UART.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOutput;

impl FlightController for DiscardOutput {
    fn send_rc_channels(&mut self, _channels: &RcChannels) {}

    fn send_link_statistics(&mut self, _stats: &LinkStatistics) {}
}

/// Writes queued frames to `sink` until the queue closes.
///
/// # Errors
///
/// Returns [`LinkError::Serial`] on the first frame the sink rejects
pub async fn run_writer<S: FrameSink>(mut sink: S, mut rx: mpsc::Receiver<Bytes>) -> Result<()> {
    let mut written: u64 = 0;

    while let Some(frame) = rx.recv().await {
        sink.send_frame(&frame).await.map_err(|e| {
            LinkError::Serial(format!("Failed to write frame {}: {}", written + 1, e))
        })?;
        written += 1;
    }

    info!(
        "Serial writer stopped after {} frames ({} bytes)",
        written,
        sink.bytes_written()
    );
    Ok(())
}
