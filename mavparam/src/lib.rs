//! # mavparam
//!
//! A library for uploading parameters to MAVLink autopilots over a serial
//! link.
//!
//! An upload session runs through four steps:
//!
//! - locate the autopilot's serial endpoint (explicit or by descriptor glob)
//! - negotiate the bit-rate by probing with heartbeats
//! - send each `<name> <value>` line of a parameter file as PARAM_SET and
//!   confirm it against the PARAM_VALUE echo, with bounded retry
//! - reboot the autopilot and release the link
//!
//! ## Features
//!
//! - `native` (default): serial port access via the `serialport` crate
//! - `serde`: serialization support for reports and records
//!
//! ## Example
//!
//! ```rust,no_run
//! use mavparam::{Session, SessionOptions};
//! use std::path::Path;
//!
//! # #[cfg(feature = "native")]
//! # fn main() {
//! let mut session = Session::native(SessionOptions::default());
//! let report = session.run(None, Path::new("params.txt"));
//! std::process::exit(report.exit_code());
//! # }
//! # #[cfg(not(feature = "native"))]
//! # fn main() {}
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod link;
pub mod locator;
pub mod mavlink;
pub mod negotiate;
pub mod params;
pub mod port;
pub mod session;
pub mod upload;

#[cfg(test)]
mod sim;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use link::SerialConnector;
#[cfg(feature = "native")]
pub use {
    device::detect_ports,
    locator::NativePortEnumerator,
    port::NativePort,
};
pub use {
    device::{DetectedPort, PREFERRED_PATTERNS, format_port_list},
    error::{Error, Result},
    link::{Connector, Link, LinkHandle, MavLink, Packet},
    locator::{Locator, PortEnumerator, TransportCandidate},
    negotiate::{BAUD_RATES, HEARTBEAT_TIMEOUT, Negotiator, NegotiatorConfig},
    params::{EncodedValue, ParamKind, ParameterReader, ParameterRecord},
    port::{Port, SerialConfig},
    session::{Session, SessionOptions, SessionReport, SessionState},
    upload::{ACK_TIMEOUT, MAX_ATTEMPTS, UploadEvent, UploadOutcome, UploadReport, Uploader, UploaderConfig},
};
