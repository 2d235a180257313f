//! Bit-rate negotiation.
//!
//! The autopilot's serial bit-rate is unknown up front. Each candidate rate is
//! probed by opening the endpoint, sending one ground-station heartbeat and
//! waiting for a heartbeat back. The first rate that answers wins.

use crate::error::{Error, Result};
use crate::link::{Connector, Link, LinkHandle};
use crate::locator::TransportCandidate;
use crate::mavlink::{Heartbeat, Message, MessageKind};
use log::{debug, info, warn};
use std::time::Duration;

/// Probe order, fastest first.
pub const BAUD_RATES: &[u32] = &[115_200, 57_600, 38_400, 19_200, 9_600];

/// How long to wait for a heartbeat reply at each rate.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Negotiation options.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// Rates to probe, in order.
    pub baud_rates: Vec<u32>,
    /// Reply timeout per rate.
    pub heartbeat_timeout: Duration,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            baud_rates: BAUD_RATES.to_vec(),
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        }
    }
}

/// Result of probing a single rate.
enum Attempt<L: Link> {
    /// The device answered; the link stays open.
    Connected(LinkHandle<L>),
    /// No heartbeat within the timeout.
    Silent,
    /// The endpoint could not be opened at this rate.
    OpenFailed(Error),
    /// The link opened but failed while probing.
    LinkFailed(Error),
}

/// Finds the bit-rate the autopilot is listening on.
#[derive(Debug, Clone, Default)]
pub struct Negotiator {
    config: NegotiatorConfig,
}

impl Negotiator {
    /// Create a negotiator with the default rates and timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a negotiator with custom options.
    pub fn with_config(config: NegotiatorConfig) -> Self {
        Self { config }
    }

    /// Active options.
    pub fn config(&self) -> &NegotiatorConfig {
        &self.config
    }

    /// Probe each configured rate in order and return the first link that
    /// answers a heartbeat.
    ///
    /// Links opened for unsuccessful rates are closed before the next rate is
    /// tried. The worst case waits `rates × heartbeat_timeout`.
    pub fn negotiate<C: Connector>(
        &self,
        connector: &mut C,
        candidate: &TransportCandidate,
    ) -> Result<LinkHandle<C::Link>> {
        for &rate in &self.config.baud_rates {
            info!("Trying {} at {rate} baud", candidate.endpoint);

            match self.attempt(connector, &candidate.endpoint, rate) {
                Attempt::Connected(handle) => {
                    info!(
                        "Connected to {} at {rate} baud (system {}, component {})",
                        candidate.endpoint,
                        handle.target_system(),
                        handle.target_component()
                    );
                    return Ok(handle);
                },
                Attempt::Silent => {
                    info!("No heartbeat at {rate} baud");
                },
                Attempt::OpenFailed(e) => {
                    warn!("Failed to open {} at {rate} baud: {e}", candidate.endpoint);
                },
                Attempt::LinkFailed(e) => {
                    warn!("Link error at {rate} baud: {e}");
                },
            }
        }

        Err(Error::LinkNegotiationFailed {
            endpoint: candidate.endpoint.clone(),
        })
    }

    fn attempt<C: Connector>(
        &self,
        connector: &mut C,
        endpoint: &str,
        rate: u32,
    ) -> Attempt<C::Link> {
        let mut link = match connector.open(endpoint, rate) {
            Ok(link) => link,
            Err(e) => return Attempt::OpenFailed(e),
        };

        let reply = link
            .send(&Message::Heartbeat(Heartbeat::ground_station()))
            .and_then(|()| link.recv(MessageKind::Heartbeat, self.config.heartbeat_timeout));

        let outcome = match reply {
            Ok(Some(packet)) => {
                return Attempt::Connected(LinkHandle::new(
                    endpoint,
                    rate,
                    link,
                    packet.system_id,
                    packet.component_id,
                ));
            },
            Ok(None) => Attempt::Silent,
            Err(e) => Attempt::LinkFailed(e),
        };

        if let Err(e) = link.close() {
            debug!("Failed to close {endpoint} after probing {rate} baud: {e}");
        }
        outcome
    }
}
