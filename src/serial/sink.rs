//! Frame sinks: where the writer task puts encoded CRSF frames.

use async_trait::async_trait;
use std::io;
use tokio::io::AsyncWriteExt;

/// Destination for complete CRSF frames
#[async_trait]
pub trait FrameSink: Send {
    /// Puts one whole frame on the wire. A frame is never split across calls.
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Bytes accepted so far
    fn bytes_written(&self) -> u64;
}

/// [`FrameSink`] over the flight controller UART.
///
/// Each frame is flushed before the call returns so the receiver's frame
/// timing reaches the flight controller unbatched.
pub struct UartSink {
    port: tokio_serial::SerialStream,
    bytes_written: u64,
}

impl UartSink {
    #[must_use]
    pub fn new(port: tokio_serial::SerialStream) -> Self {
        Self {
            port,
            bytes_written: 0,
        }
    }
}

impl std::fmt::Debug for UartSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UartSink")
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FrameSink for UartSink {
    async fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame).await?;
        self.port.flush().await?;
        self.bytes_written += frame.len() as u64;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
