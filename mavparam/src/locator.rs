//! Transport locator: picks the serial endpoint to negotiate on.

use crate::device::{DetectedPort, PREFERRED_PATTERNS};
use crate::error::{Error, Result};
use log::info;
use std::fmt;

/// A serial endpoint chosen for negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCandidate {
    /// Endpoint path handed to the connector.
    pub endpoint: String,
    /// Descriptor, only used for matching and logging.
    pub descriptor: String,
}

impl TransportCandidate {
    /// Candidate for an endpoint given explicitly by the user.
    pub fn explicit(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            descriptor: endpoint.clone(),
            endpoint,
        }
    }
}

impl From<&DetectedPort> for TransportCandidate {
    fn from(port: &DetectedPort) -> Self {
        Self {
            endpoint: port.name.clone(),
            descriptor: port.descriptor(),
        }
    }
}

impl fmt::Display for TransportCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descriptor == self.endpoint {
            write!(f, "{}", self.endpoint)
        } else {
            write!(f, "{} ({})", self.endpoint, self.descriptor)
        }
    }
}

/// Source of serial endpoints for auto-detection.
pub trait PortEnumerator {
    /// List the serial endpoints currently present on the host.
    fn list_ports(&self) -> Result<Vec<DetectedPort>>;
}

/// Enumerates host serial ports through the `serialport` crate.
#[cfg(feature = "native")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePortEnumerator;

#[cfg(feature = "native")]
impl PortEnumerator for NativePortEnumerator {
    fn list_ports(&self) -> Result<Vec<DetectedPort>> {
        crate::device::detect_ports()
    }
}

/// Finds the autopilot endpoint by descriptor pattern.
#[derive(Debug, Clone)]
pub struct Locator {
    patterns: Vec<String>,
}

impl Default for Locator {
    fn default() -> Self {
        Self {
            patterns: PREFERRED_PATTERNS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Locator {
    /// Create a locator with the built-in patterns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append extra patterns after the built-in ones.
    #[must_use]
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Active patterns, in order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// All matching endpoints, sorted by endpoint name.
    pub fn candidates(&self, ports: &[DetectedPort]) -> Vec<TransportCandidate> {
        let mut matching: Vec<TransportCandidate> = ports
            .iter()
            .filter(|p| p.matches_any(self.patterns.as_slice()))
            .map(TransportCandidate::from)
            .collect();
        matching.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        matching
    }

    /// Resolve the endpoint to use.
    ///
    /// An explicit endpoint is returned verbatim without enumerating. Otherwise
    /// the first matching endpoint in lexical order is chosen; every match is
    /// logged when there is more than one.
    pub fn locate<E: PortEnumerator + ?Sized>(
        &self,
        explicit_endpoint: Option<&str>,
        enumerator: &E,
    ) -> Result<TransportCandidate> {
        if let Some(endpoint) = explicit_endpoint {
            return Ok(TransportCandidate::explicit(endpoint));
        }

        let ports = enumerator.list_ports()?;
        let mut candidates = self.candidates(&ports);

        if candidates.len() > 1 {
            info!("Auto-detected serial ports are:");
            for candidate in &candidates {
                info!(" {candidate}");
            }
        }

        if candidates.is_empty() {
            return Err(Error::NoDeviceFound);
        }

        let chosen = candidates.swap_remove(0);
        info!("Using port {}", chosen.endpoint);
        Ok(chosen)
    }
}
