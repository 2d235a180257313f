//! Parameter upload with per-parameter acknowledgment.
//!
//! Each parameter is sent as PARAM_SET and confirmed by the PARAM_VALUE the
//! autopilot echoes back. The echo must carry the same name and the exact
//! same 32-bit pattern; anything else counts as a failed attempt.

use crate::error::Result;
use crate::link::{Link, LinkHandle};
use crate::mavlink::{Message, MessageKind, ParamSet, ParamValue};
use crate::params::ParameterRecord;
use log::{debug, info, warn};
use std::time::Duration;

/// Attempts per parameter before giving up on it.
pub const MAX_ATTEMPTS: u32 = 10;

/// How long to wait for the PARAM_VALUE echo after each PARAM_SET.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Upload options.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Attempts per parameter.
    pub max_attempts: u32,
    /// Echo timeout per attempt.
    pub ack_timeout: Duration,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            ack_timeout: ACK_TIMEOUT,
        }
    }
}

/// Final state of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UploadOutcome {
    /// Parameter name.
    pub name: String,
    /// Whether the device confirmed the value.
    pub success: bool,
    /// Failed attempts before the outcome was decided.
    pub retries: u32,
}

/// Outcomes of an upload pass, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UploadReport {
    /// Per-parameter outcomes.
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    /// True when every parameter was confirmed (also for an empty file).
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }

    /// Names of the parameters that were never confirmed.
    pub fn failed_names(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.name.clone())
            .collect()
    }

    /// Number of confirmed parameters.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }
}

/// Progress notification passed to the upload observer.
#[derive(Debug)]
pub enum UploadEvent<'a> {
    /// About to send the first PARAM_SET for this record.
    Started(&'a ParameterRecord),
    /// The record's outcome is decided.
    Finished(&'a UploadOutcome),
}

/// How one PARAM_SET attempt ended.
enum Ack {
    Matched,
    NoResponse,
    Mismatch(ParamValue),
}

/// Sends parameters and checks their echoes.
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    config: UploaderConfig,
}

impl Uploader {
    /// Create an uploader with the default attempt count and timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an uploader with custom options.
    pub fn with_config(config: UploaderConfig) -> Self {
        Self { config }
    }

    /// Active options.
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Upload records in order, pulling each one from `records` only after
    /// the previous one is decided.
    ///
    /// Unconfirmed parameters are recorded in the report and do not stop the
    /// pass. A record error or a link error aborts immediately.
    pub fn upload<L, I>(
        &self,
        link: &mut LinkHandle<L>,
        records: I,
        observer: &mut dyn FnMut(UploadEvent<'_>),
    ) -> Result<UploadReport>
    where
        L: Link,
        I: IntoIterator<Item = Result<ParameterRecord>>,
    {
        let mut report = UploadReport::default();

        for record in records {
            let record = record?;
            observer(UploadEvent::Started(&record));
            let outcome = self.upload_param(link, &record)?;
            observer(UploadEvent::Finished(&outcome));
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    /// Upload a single parameter with bounded retry.
    pub fn upload_param<L: Link>(
        &self,
        link: &mut LinkHandle<L>,
        record: &ParameterRecord,
    ) -> Result<UploadOutcome> {
        if !record.fits_param_id() {
            warn!(
                "Skipping {} (line {}): name exceeds the 16-byte param_id field",
                record.name, record.line
            );
            return Ok(UploadOutcome {
                name: record.name.clone(),
                success: false,
                retries: 0,
            });
        }

        info!("Setting {} to {}", record.name, record.raw);

        let request = Message::ParamSet(ParamSet {
            target_system: link.target_system(),
            target_component: link.target_component(),
            param_id: record.name.clone(),
            value_bits: record.value.bits(),
            param_type: record.kind.mav_type(),
        });

        let mut retries = 0;
        for attempt in 1..=self.config.max_attempts {
            link.send(&request)?;

            match self.await_ack(link, record)? {
                Ack::Matched => {
                    info!("Successfully set {} to {}", record.name, record.raw);
                    return Ok(UploadOutcome {
                        name: record.name.clone(),
                        success: true,
                        retries,
                    });
                },
                Ack::NoResponse => {
                    warn!(
                        "No response for {} (attempt {attempt}/{})",
                        record.name, self.config.max_attempts
                    );
                },
                Ack::Mismatch(echo) => {
                    warn!(
                        "Failed to set {}: device reported {} = {:#010x} (attempt {attempt}/{})",
                        record.name, echo.param_id, echo.value_bits, self.config.max_attempts
                    );
                },
            }
            retries += 1;
        }

        warn!(
            "Giving up on {} after {} attempts",
            record.name, self.config.max_attempts
        );
        Ok(UploadOutcome {
            name: record.name.clone(),
            success: false,
            retries,
        })
    }

    fn await_ack<L: Link>(
        &self,
        link: &mut LinkHandle<L>,
        record: &ParameterRecord,
    ) -> Result<Ack> {
        let Some(packet) = link.recv(MessageKind::ParamValue, self.config.ack_timeout)? else {
            return Ok(Ack::NoResponse);
        };
        let Message::ParamValue(echo) = packet.message else {
            return Ok(Ack::NoResponse);
        };

        debug!(
            "PARAM_VALUE {} = {:#010x} (type {})",
            echo.param_id, echo.value_bits, echo.param_type
        );

        if echo.param_id == record.name && echo.value_bits == record.value.bits() {
            Ok(Ack::Matched)
        } else {
            Ok(Ack::Mismatch(echo))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::link::Connector;
    use crate::mavlink::message::{MAV_PARAM_TYPE_INT32, MAV_PARAM_TYPE_REAL32};
    use crate::params::ParameterReader;
    use crate::sim::{
        AckMode, DEVICE_COMPONENT_ID, DEVICE_SYSTEM_ID, SimConnector, SimDevice, SimLink, SimLog,
    };
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    fn open(device: SimDevice) -> (LinkHandle<SimLink>, Rc<RefCell<SimLog>>) {
        let mut connector = SimConnector::new(device);
        let log = connector.log();
        let link = connector.open("/dev/sim", 57_600).unwrap();
        let handle = LinkHandle::new("/dev/sim", 57_600, link, DEVICE_SYSTEM_ID, DEVICE_COMPONENT_ID);
        (handle, log)
    }

    fn records(text: &str) -> ParameterReader<Cursor<Vec<u8>>> {
        ParameterReader::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn upload(
        handle: &mut LinkHandle<SimLink>,
        text: &str,
    ) -> Result<UploadReport> {
        Uploader::new().upload(handle, records(text), &mut |_| {})
    }

    #[test]
    fn test_first_attempt_echo_succeeds() {
        let (mut handle, log) = open(SimDevice::new());
        let report = upload(&mut handle, "MPC_Z_P 1.5\n").unwrap();

        assert_eq!(
            report.outcomes,
            vec![UploadOutcome {
                name: "MPC_Z_P".to_string(),
                success: true,
                retries: 0,
            }]
        );
        assert!(report.all_succeeded());

        let log = log.borrow();
        let Some(Message::ParamSet(set)) = log.sent.first() else {
            panic!("expected PARAM_SET");
        };
        assert_eq!(set.param_id, "MPC_Z_P");
        assert_eq!(set.value_bits, 1.5f32.to_bits());
        assert_eq!(set.param_type, MAV_PARAM_TYPE_REAL32);
        assert_eq!(
            (set.target_system, set.target_component),
            (DEVICE_SYSTEM_ID, DEVICE_COMPONENT_ID)
        );
        assert_eq!(log.recv_timeouts, vec![ACK_TIMEOUT]);
    }

    #[test]
    fn test_integer_sent_as_bit_pattern() {
        let (mut handle, log) = open(SimDevice::new());
        upload(&mut handle, "SYS_AUTOSTART 4\n").unwrap();

        let log = log.borrow();
        let Some(Message::ParamSet(set)) = log.sent.first() else {
            panic!("expected PARAM_SET");
        };
        assert_eq!(set.value_bits, 0x0000_0004);
        assert_eq!(set.param_type, MAV_PARAM_TYPE_INT32);
    }

    #[test]
    fn test_mismatched_echo_exhausts_attempts_and_continues() {
        let device = SimDevice::new().ack("SYS_AUTOSTART", AckMode::Corrupt);
        let (mut handle, log) = open(device);

        let report = upload(&mut handle, "SYS_AUTOSTART 4\nMPC_Z_P 1.5\n").unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.outcomes[0].success);
        assert_eq!(report.outcomes[0].retries, MAX_ATTEMPTS);
        assert!(report.outcomes[1].success);
        assert_eq!(report.outcomes[1].retries, 0);
        assert!(!report.all_succeeded());
        assert_eq!(report.failed_names(), vec!["SYS_AUTOSTART".to_string()]);
        assert_eq!(report.succeeded(), 1);

        let log = log.borrow();
        assert_eq!(log.attempts("SYS_AUTOSTART"), 10);
        assert_eq!(log.attempts("MPC_Z_P"), 1);
    }

    #[test]
    fn test_silent_device_counts_retries() {
        let (mut handle, log) = open(SimDevice::new().default_ack(AckMode::Silent));
        let report = upload(&mut handle, "MPC_Z_P 1.5\n").unwrap();

        assert_eq!(report.outcomes[0].retries, 10);
        assert!(!report.outcomes[0].success);
        let waited: Duration = log.borrow().recv_timeouts.iter().sum();
        assert_eq!(waited, ACK_TIMEOUT * 10);
    }

    #[test]
    fn test_late_echo_counts_failed_attempts() {
        let device = SimDevice::new().ack("MPC_Z_P", AckMode::EchoAfter(3));
        let (mut handle, _log) = open(device);
        let report = upload(&mut handle, "MPC_Z_P 1.5\n").unwrap();

        assert!(report.outcomes[0].success);
        assert_eq!(report.outcomes[0].retries, 3);
    }

    #[test]
    fn test_echo_for_other_parameter_is_mismatch() {
        let device = SimDevice::new().ack("MPC_Z_P", AckMode::WrongName);
        let (mut handle, _log) = open(device);
        let report = upload(&mut handle, "MPC_Z_P 1.5\n").unwrap();
        assert!(!report.outcomes[0].success);
    }

    #[test]
    fn test_upload_twice_is_idempotent() {
        let (mut handle, _log) = open(SimDevice::new());
        let text = "MPC_Z_P 1.5\nSYS_AUTOSTART 4\n";

        let first = upload(&mut handle, text).unwrap();
        let second = upload(&mut handle, text).unwrap();

        assert_eq!(first, second);
        assert!(second.outcomes.iter().all(|o| o.success && o.retries == 0));
    }

    #[test]
    fn test_malformed_line_aborts_remaining_records() {
        let (mut handle, log) = open(SimDevice::new());
        let err = upload(&mut handle, "A_PARAM 1\nONLY_ONE_TOKEN\nB_PARAM 2\n").unwrap_err();

        assert!(matches!(err, Error::MalformedParameterLine { line: 2, .. }));
        assert_eq!(log.borrow().param_sets(), vec!["A_PARAM".to_string()]);
    }

    #[test]
    fn test_overlong_name_fails_and_batch_continues() {
        let (mut handle, log) = open(SimDevice::new());
        let report = upload(&mut handle, "ABCDEFGHIJKLMNOPQ 1\nMPC_Z_P 1.5\n").unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.outcomes[0].success);
        assert_eq!(report.outcomes[0].retries, 0);
        assert!(report.outcomes[1].success);
        assert_eq!(report.failed_names(), vec!["ABCDEFGHIJKLMNOPQ".to_string()]);
        assert_eq!(log.borrow().param_sets(), vec!["MPC_Z_P".to_string()]);
    }

    #[test]
    fn test_send_failure_propagates() {
        let (mut handle, _log) = open(SimDevice::new().fail_send(MessageKind::ParamSet));
        let err = upload(&mut handle, "MPC_Z_P 1.5\n").unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_empty_file_is_vacuous_success() {
        let (mut handle, log) = open(SimDevice::new());
        let report = upload(&mut handle, "").unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
        assert!(log.borrow().sent.is_empty());
    }

    #[test]
    fn test_observer_sees_each_record() {
        let device = SimDevice::new().ack("B", AckMode::Silent);
        let (mut handle, _log) = open(device);
        let mut events = Vec::new();

        Uploader::new()
            .upload(&mut handle, records("A 1\nB 2\n"), &mut |event| match event {
                UploadEvent::Started(record) => events.push(format!("start {}", record.name)),
                UploadEvent::Finished(outcome) => {
                    events.push(format!("{} {}", outcome.name, outcome.success));
                },
            })
            .unwrap();

        assert_eq!(events, ["start A", "A true", "start B", "B false"]);
    }

    #[test]
    fn test_custom_attempts_and_timeout() {
        let config = UploaderConfig {
            max_attempts: 3,
            ack_timeout: Duration::from_millis(200),
        };
        let (mut handle, log) = open(SimDevice::new().default_ack(AckMode::Silent));
        let report = Uploader::with_config(config)
            .upload(&mut handle, records("A 1\n"), &mut |_| {})
            .unwrap();

        assert_eq!(report.outcomes[0].retries, 3);
        assert_eq!(
            log.borrow().recv_timeouts,
            vec![Duration::from_millis(200); 3]
        );
    }
}
