//! Byte-level serial port abstraction.
//!
//! [`crate::link::MavLink`] frames and parses MAVLink over anything that
//! implements [`Port`]; [`NativePort`] is the `serialport`-backed one.

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Where and how fast to open a serial endpoint. Framing is always 8N1 with
/// no flow control, which is what autopilot telemetry ports expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Endpoint path (e.g., "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Bit-rate.
    pub baud_rate: u32,
    /// Read timeout used as the link's polling interval.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Short read timeout; the link layer loops until its own deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

    /// Configuration for `port_name` at `baud_rate`.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Override the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte stream with a configurable read timeout.
pub trait Port: Read + Write + Send {
    /// Change the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Current read timeout.
    fn timeout(&self) -> Duration;

    /// Drop anything queued in either direction.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Release the endpoint. Further I/O fails.
    fn close(&mut self) -> Result<()>;

    /// Write a whole frame and flush it.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf)?;
        self.flush()?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
