//! Session controller: locate, negotiate, upload, reboot, close.
//!
//! ```text
//! Idle -> Located -> Negotiated -> Uploaded -> Rebooted -> Closed
//!   \________\___________\____________\___________\-----> Aborted
//! ```
//!
//! The session owns the negotiated link and lends it to the uploader and the
//! reboot step. Once negotiation succeeds the link is closed exactly once,
//! whichever way the session ends.

use crate::error::{Error, Result};
use crate::link::{Connector, Link, LinkHandle};
use crate::locator::{Locator, PortEnumerator};
use crate::negotiate::Negotiator;
use crate::params::ParameterReader;
use crate::upload::{UploadEvent, UploadReport, Uploader};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::Path;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing done yet.
    Idle,
    /// An endpoint was chosen.
    Located,
    /// A bit-rate answered and the link is open.
    Negotiated,
    /// Every record was processed.
    Uploaded,
    /// The reboot command was sent.
    Rebooted,
    /// The link was released after a completed pass.
    Closed,
    /// An unrecoverable error ended the session.
    Aborted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Located => "located",
            Self::Negotiated => "negotiated",
            Self::Uploaded => "uploaded",
            Self::Rebooted => "rebooted",
            Self::Closed => "closed",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Session behaviour.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Endpoint discovery.
    pub locator: Locator,
    /// Bit-rate probing.
    pub negotiator: Negotiator,
    /// Parameter upload.
    pub uploader: Uploader,
    /// Send the reboot command after the upload pass.
    pub reboot: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            locator: Locator::new(),
            negotiator: Negotiator::new(),
            uploader: Uploader::new(),
            reboot: true,
        }
    }
}

/// What a session did and how it ended.
#[derive(Debug)]
pub struct SessionReport {
    /// States visited, in order.
    pub trail: Vec<SessionState>,
    /// Endpoint the link was negotiated on.
    pub endpoint: Option<String>,
    /// Negotiated bit-rate.
    pub baud_rate: Option<u32>,
    /// Upload outcomes, present once the upload pass completed.
    pub upload: Option<UploadReport>,
    /// The error that ended the session, or the partial-failure summary.
    pub error: Option<Error>,
}

impl SessionReport {
    fn new() -> Self {
        Self {
            trail: vec![SessionState::Idle],
            endpoint: None,
            baud_rate: None,
            upload: None,
            error: None,
        }
    }

    /// Last state reached.
    pub fn state(&self) -> SessionState {
        self.trail.last().copied().unwrap_or(SessionState::Idle)
    }

    /// True when no phase failed and every parameter was confirmed.
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.upload.as_ref().is_some_and(UploadReport::all_succeeded)
    }

    /// Process exit status: 0 on full success, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.succeeded())
    }

    /// Convert into the upload report or the error that ended the session.
    pub fn into_result(self) -> Result<UploadReport> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.upload.unwrap_or_default()),
        }
    }

    fn enter(&mut self, state: SessionState) {
        debug!("Session state: {state}");
        self.trail.push(state);
    }

    fn abort(mut self, e: Error) -> Self {
        error!("{e}");
        self.enter(SessionState::Aborted);
        self.error = Some(e);
        self
    }
}

/// One upload run against one autopilot.
pub struct Session<E, C> {
    enumerator: E,
    connector: C,
    options: SessionOptions,
}

#[cfg(feature = "native")]
impl Session<crate::locator::NativePortEnumerator, crate::link::SerialConnector> {
    /// Session over the host's serial ports.
    pub fn native(options: SessionOptions) -> Self {
        Self::new(
            crate::locator::NativePortEnumerator,
            crate::link::SerialConnector::new(),
            options,
        )
    }
}

impl<E: PortEnumerator, C: Connector> Session<E, C> {
    /// Create a session from its collaborators.
    pub fn new(enumerator: E, connector: C, options: SessionOptions) -> Self {
        Self {
            enumerator,
            connector,
            options,
        }
    }

    /// Active options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run the whole session.
    pub fn run(&mut self, explicit_endpoint: Option<&str>, params_path: &Path) -> SessionReport {
        self.run_with_observer(explicit_endpoint, params_path, &mut |_| {})
    }

    /// Run the whole session, reporting upload progress to `observer`.
    pub fn run_with_observer(
        &mut self,
        explicit_endpoint: Option<&str>,
        params_path: &Path,
        observer: &mut dyn FnMut(UploadEvent<'_>),
    ) -> SessionReport {
        let mut report = SessionReport::new();

        // Opened up front so a missing file never touches the device.
        let records = match ParameterReader::open(params_path) {
            Ok(records) => records,
            Err(e) => return report.abort(e),
        };

        let candidate = match self
            .options
            .locator
            .locate(explicit_endpoint, &self.enumerator)
        {
            Ok(candidate) => candidate,
            Err(e) => return report.abort(e),
        };
        report.enter(SessionState::Located);

        let mut handle = match self
            .options
            .negotiator
            .negotiate(&mut self.connector, &candidate)
        {
            Ok(handle) => handle,
            Err(e) => return report.abort(e),
        };
        report.enter(SessionState::Negotiated);
        report.endpoint = Some(handle.endpoint().to_string());
        report.baud_rate = Some(handle.baud_rate());

        let outcome = self.upload_and_reboot(&mut handle, records, observer, &mut report);
        let closed = handle.close();

        match (outcome, closed) {
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    warn!("Failed to close {}: {close_err}", candidate.endpoint);
                }
                return report.abort(e);
            },
            (Ok(()), Err(e)) => return report.abort(e),
            (Ok(()), Ok(())) => report.enter(SessionState::Closed),
        }

        if let Some(upload) = &report.upload {
            let failed = upload.failed_names();
            if failed.is_empty() {
                info!("All {} parameter(s) set", upload.outcomes.len());
            } else {
                let e = Error::ParameterUploadPartialFailure { failed };
                warn!("{e}");
                report.error = Some(e);
            }
        }

        report
    }

    fn upload_and_reboot<L: Link>(
        &self,
        handle: &mut LinkHandle<L>,
        records: ParameterReader<std::io::BufReader<std::fs::File>>,
        observer: &mut dyn FnMut(UploadEvent<'_>),
        report: &mut SessionReport,
    ) -> Result<()> {
        let upload = self.options.uploader.upload(handle, records, observer)?;
        report.upload = Some(upload);
        report.enter(SessionState::Uploaded);

        if self.options.reboot {
            info!("Rebooting autopilot");
            handle.reboot()?;
            report.enter(SessionState::Rebooted);
        } else {
            info!("Skipping reboot");
        }
        Ok(())
    }
}
