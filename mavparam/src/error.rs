//! Error types for mavparam.

use std::io;
use thiserror::Error;

/// Result type for mavparam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mavparam operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, parameter file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No serial endpoint matched the preferred autopilot patterns.
    #[error("No serial connection found")]
    NoDeviceFound,

    /// No candidate bit-rate produced a heartbeat reply.
    #[error("Failed to connect on {endpoint} with any baud rate")]
    LinkNegotiationFailed {
        /// Endpoint that was probed.
        endpoint: String,
    },

    /// One or more parameters were never acknowledged.
    #[error("{} parameter(s) failed to upload: {}", failed.len(), failed.join(", "))]
    ParameterUploadPartialFailure {
        /// Names of the parameters that failed, in file order.
        failed: Vec<String>,
    },

    /// A parameter line does not split into exactly two tokens.
    #[error("Malformed parameter line {line}: {content:?}")]
    MalformedParameterLine {
        /// 1-based line number.
        line: usize,
        /// Raw line content.
        content: String,
    },

    /// A parameter value is not a valid 32-bit integer or float.
    #[error("Invalid value {value:?} for parameter {name} on line {line}")]
    InvalidParameterValue {
        /// 1-based line number.
        line: usize,
        /// Parameter name.
        name: String,
        /// Raw value text.
        value: String,
    },

    /// MAVLink framing or decoding error.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether this error came from the link rather than from the input or
    /// the device's answers.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Io(_) | Self::Protocol(_) => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }
}
