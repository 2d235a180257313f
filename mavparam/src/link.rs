//! Message-level link primitives and the negotiated link handle.
//!
//! [`Connector`] and [`Link`] are the seam between the upload logic and the
//! transport: the session only ever opens, sends, receives with a timeout, and
//! closes. [`MavLink`] implements them over any [`Port`] with the MAVLink
//! codec; [`SerialConnector`] opens native serial ports.

use crate::error::Result;
use crate::mavlink::{CommandLong, Frame, FrameParser, Message, MessageKind};
use crate::port::Port;
use log::{debug, trace, warn};
use std::fmt;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

/// System id used for outgoing frames (ground station convention).
pub const SOURCE_SYSTEM_ID: u8 = 255;
/// Component id used for outgoing frames.
pub const SOURCE_COMPONENT_ID: u8 = 0;

/// A received message with the sender's ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Sender system id.
    pub system_id: u8,
    /// Sender component id.
    pub component_id: u8,
    /// Decoded message.
    pub message: Message,
}

/// An open message link to a device.
pub trait Link {
    /// Send one message.
    fn send(&mut self, message: &Message) -> Result<()>;

    /// Wait up to `timeout` for a message of `kind`, discarding others.
    ///
    /// Returns `Ok(None)` when the timeout elapses without one.
    fn recv(&mut self, kind: MessageKind, timeout: Duration) -> Result<Option<Packet>>;

    /// Release the underlying resource.
    fn close(&mut self) -> Result<()>;
}

/// Opens links to an endpoint at a given bit-rate.
pub trait Connector {
    /// Link type produced by this connector.
    type Link: Link;

    /// Open `endpoint` at `baud_rate`.
    fn open(&mut self, endpoint: &str, baud_rate: u32) -> Result<Self::Link>;
}

/// MAVLink over a byte-oriented port.
pub struct MavLink<P: Port> {
    port: P,
    parser: FrameParser,
    poll_interval: Duration,
    sequence: u8,
    system_id: u8,
    component_id: u8,
}

impl<P: Port> MavLink<P> {
    /// Wrap an open port. The port's current timeout becomes the read
    /// polling interval.
    pub fn new(port: P) -> Self {
        Self {
            poll_interval: port.timeout(),
            port,
            parser: FrameParser::new(),
            sequence: 0,
            system_id: SOURCE_SYSTEM_ID,
            component_id: SOURCE_COMPONENT_ID,
        }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Pop buffered frames until one of `kind` decodes.
    fn take_buffered(&mut self, kind: MessageKind) -> Option<Packet> {
        while let Some(frame) = self.parser.next_frame() {
            if frame.message_id != kind.id() {
                trace!("Discarding message id {} while waiting for {kind}", frame.message_id);
                continue;
            }
            match frame.message() {
                Ok(message) => {
                    return Some(Packet {
                        system_id: frame.system_id,
                        component_id: frame.component_id,
                        message,
                    });
                },
                Err(e) => debug!("Undecodable {kind}: {e}"),
            }
        }
        None
    }
}

impl<P: Port> Link for MavLink<P> {
    fn send(&mut self, message: &Message) -> Result<()> {
        let data = Frame::encode_v1(message, self.sequence, self.system_id, self.component_id);
        trace!(
            "Sending {} (seq {}): {} bytes",
            message.kind(),
            self.sequence,
            data.len()
        );
        self.sequence = self.sequence.wrapping_add(1);
        self.port.write_all_bytes(&data)
    }

    fn recv(&mut self, kind: MessageKind, timeout: Duration) -> Result<Option<Packet>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            if let Some(packet) = self.take_buffered(kind) {
                return Ok(Some(packet));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wait = (deadline - now).min(self.poll_interval);
            if wait != self.port.timeout() {
                self.port.set_timeout(wait)?;
            }

            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    trace!("Received {n} bytes");
                    self.parser.push(&buf[..n]);
                },
                Ok(_) => {},
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.parser.clear();
        self.port.close()
    }
}

/// Opens MAVLink links on native serial ports.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct SerialConnector {
    read_timeout: Duration,
}

#[cfg(feature = "native")]
impl Default for SerialConnector {
    fn default() -> Self {
        Self {
            read_timeout: crate::port::SerialConfig::DEFAULT_TIMEOUT,
        }
    }
}

#[cfg(feature = "native")]
impl SerialConnector {
    /// Create a connector with the default read polling interval.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "native")]
impl Connector for SerialConnector {
    type Link = MavLink<crate::port::NativePort>;

    fn open(&mut self, endpoint: &str, baud_rate: u32) -> Result<Self::Link> {
        let config =
            crate::port::SerialConfig::new(endpoint, baud_rate).with_timeout(self.read_timeout);
        let mut port = crate::port::NativePort::open(&config)?;
        port.clear_buffers()?;
        Ok(MavLink::new(port))
    }
}

/// A negotiated connection: endpoint, bit-rate, and the device's ids.
///
/// The link is closed exactly once, either through [`LinkHandle::close`] or
/// when the handle is dropped.
pub struct LinkHandle<L: Link> {
    endpoint: String,
    baud_rate: u32,
    target_system: u8,
    target_component: u8,
    link: Option<L>,
}

impl<L: Link> fmt::Debug for LinkHandle<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHandle")
            .field("endpoint", &self.endpoint)
            .field("baud_rate", &self.baud_rate)
            .field("target_system", &self.target_system)
            .field("target_component", &self.target_component)
            .field("open", &self.is_open())
            .finish()
    }
}

impl<L: Link> LinkHandle<L> {
    /// Wrap a link that answered on `baud_rate`, addressed to the heartbeat
    /// sender's ids.
    pub fn new(
        endpoint: impl Into<String>,
        baud_rate: u32,
        link: L,
        target_system: u8,
        target_component: u8,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            baud_rate,
            target_system,
            target_component,
            link: Some(link),
        }
    }

    /// Endpoint this link is open on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Negotiated bit-rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Device system id.
    pub fn target_system(&self) -> u8 {
        self.target_system
    }

    /// Device component id.
    pub fn target_component(&self) -> u8 {
        self.target_component
    }

    /// Whether the link has not been closed yet.
    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn link_mut(&mut self) -> Result<&mut L> {
        self.link.as_mut().ok_or_else(|| {
            std::io::Error::new(ErrorKind::NotConnected, "link already closed").into()
        })
    }

    /// Send one message.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.link_mut()?.send(message)
    }

    /// Wait up to `timeout` for a message of `kind`.
    pub fn recv(&mut self, kind: MessageKind, timeout: Duration) -> Result<Option<Packet>> {
        self.link_mut()?.recv(kind, timeout)
    }

    /// Ask the autopilot to reboot.
    pub fn reboot(&mut self) -> Result<()> {
        let command = CommandLong::reboot_autopilot(self.target_system, self.target_component);
        self.send(&Message::CommandLong(command))
    }

    /// Close the link. Later calls (and the drop) are no-ops.
    pub fn close(&mut self) -> Result<()> {
        match self.link.take() {
            Some(mut link) => {
                debug!("Closing link on {}", self.endpoint);
                link.close()
            },
            None => Ok(()),
        }
    }
}

impl<L: Link> Drop for LinkHandle<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {e}", self.endpoint);
        }
    }
}
