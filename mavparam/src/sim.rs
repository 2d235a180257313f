//! Scripted device used by unit tests.
//!
//! [`SimConnector`] hands out [`SimLink`]s that answer like an autopilot
//! according to a [`SimDevice`] script, and records everything the code
//! under test does in a shared [`SimLog`].

use crate::error::{Error, Result};
use crate::link::{Connector, Link, Packet};
use crate::mavlink::{Heartbeat, Message, MessageKind, ParamValue};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// Device system id used in replies.
pub const DEVICE_SYSTEM_ID: u8 = 1;
/// Device component id used in replies.
pub const DEVICE_COMPONENT_ID: u8 = 1;

/// How the device answers a PARAM_SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Echo name and value bits.
    Echo,
    /// Never answer.
    Silent,
    /// Echo the name with a different value pattern.
    Corrupt,
    /// Answer for a different parameter.
    WrongName,
    /// Stay silent for the first `n` attempts, then echo.
    EchoAfter(usize),
}

/// Device behaviour script.
#[derive(Debug, Clone)]
pub struct SimDevice {
    alive_at: Option<u32>,
    fail_open_at: Vec<u32>,
    fail_send: Option<MessageKind>,
    default_ack: AckMode,
    acks: HashMap<String, AckMode>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self {
            alive_at: None,
            fail_open_at: Vec::new(),
            fail_send: None,
            default_ack: AckMode::Echo,
            acks: HashMap::new(),
        }
    }

    /// Reply to heartbeats only at this rate.
    pub fn alive_at(mut self, baud_rate: u32) -> Self {
        self.alive_at = Some(baud_rate);
        self
    }

    /// Refuse to open at this rate.
    pub fn fail_open_at(mut self, baud_rate: u32) -> Self {
        self.fail_open_at.push(baud_rate);
        self
    }

    /// Make every send of this kind fail with an I/O error.
    pub fn fail_send(mut self, kind: MessageKind) -> Self {
        self.fail_send = Some(kind);
        self
    }

    /// Ack behaviour for parameters without an override.
    pub fn default_ack(mut self, mode: AckMode) -> Self {
        self.default_ack = mode;
        self
    }

    /// Ack behaviour for one parameter.
    pub fn ack(mut self, name: &str, mode: AckMode) -> Self {
        self.acks.insert(name.to_string(), mode);
        self
    }

    fn ack_mode(&self, name: &str) -> AckMode {
        self.acks.get(name).copied().unwrap_or(self.default_ack)
    }
}

/// Everything observed by the simulated device.
#[derive(Debug, Default)]
pub struct SimLog {
    /// Rates passed to `open`, in order (including failed opens).
    pub opens: Vec<u32>,
    /// Number of `close` calls across all links.
    pub closes: usize,
    /// Messages sent, in order.
    pub sent: Vec<Message>,
    /// Timeouts passed to `recv`, in order.
    pub recv_timeouts: Vec<Duration>,
}

impl SimLog {
    /// Names of PARAM_SET requests, in order.
    pub fn param_sets(&self) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|m| match m {
                Message::ParamSet(ps) => Some(ps.param_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of PARAM_SET requests for `name`.
    pub fn attempts(&self, name: &str) -> usize {
        self.param_sets().iter().filter(|n| *n == name).count()
    }

    /// Number of COMMAND_LONG messages sent.
    pub fn commands(&self) -> usize {
        self.sent
            .iter()
            .filter(|m| m.kind() == MessageKind::CommandLong)
            .count()
    }
}

/// Connector producing [`SimLink`]s.
pub struct SimConnector {
    device: Rc<SimDevice>,
    log: Rc<RefCell<SimLog>>,
}

impl SimConnector {
    pub fn new(device: SimDevice) -> Self {
        Self {
            device: Rc::new(device),
            log: Rc::new(RefCell::new(SimLog::default())),
        }
    }

    /// Shared handle on the observation log.
    pub fn log(&self) -> Rc<RefCell<SimLog>> {
        Rc::clone(&self.log)
    }
}

impl Connector for SimConnector {
    type Link = SimLink;

    fn open(&mut self, endpoint: &str, baud_rate: u32) -> Result<SimLink> {
        self.log.borrow_mut().opens.push(baud_rate);
        if self.device.fail_open_at.contains(&baud_rate) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("cannot open {endpoint}"),
            )
            .into());
        }
        Ok(SimLink {
            baud_rate,
            device: Rc::clone(&self.device),
            log: Rc::clone(&self.log),
            pending: VecDeque::new(),
            attempts: HashMap::new(),
        })
    }
}

/// One simulated connection.
pub struct SimLink {
    baud_rate: u32,
    device: Rc<SimDevice>,
    log: Rc<RefCell<SimLog>>,
    pending: VecDeque<Message>,
    attempts: HashMap<String, usize>,
}

impl SimLink {
    fn answer_param_set(&mut self, name: &str, bits: u32, param_type: u8) {
        let attempt = self.attempts.entry(name.to_string()).or_insert(0);
        *attempt += 1;

        let reply = |param_id: &str, value_bits: u32| {
            Message::ParamValue(ParamValue {
                param_id: param_id.to_string(),
                value_bits,
                param_type,
                param_count: 1,
                param_index: 0,
            })
        };

        let answer = match self.device.ack_mode(name) {
            AckMode::Echo => Some(reply(name, bits)),
            AckMode::Silent => None,
            AckMode::Corrupt => Some(reply(name, bits ^ 0x8000_0001)),
            AckMode::WrongName => Some(reply("OTHER_PARAM", bits)),
            AckMode::EchoAfter(n) => (*attempt > n).then(|| reply(name, bits)),
        };

        if let Some(answer) = answer {
            self.pending.push_back(answer);
        }
    }
}

impl Link for SimLink {
    fn send(&mut self, message: &Message) -> Result<()> {
        self.log.borrow_mut().sent.push(message.clone());

        if self.device.fail_send == Some(message.kind()) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }

        match message {
            Message::Heartbeat(_) if self.device.alive_at == Some(self.baud_rate) => {
                self.pending.push_back(Message::Heartbeat(Heartbeat {
                    custom_mode: 0,
                    mav_type: 2,
                    autopilot: 12,
                    base_mode: 0,
                    system_status: 3,
                    mavlink_version: 3,
                }));
            },
            Message::ParamSet(ps) => {
                self.answer_param_set(&ps.param_id, ps.value_bits, ps.param_type);
            },
            _ => {},
        }
        Ok(())
    }

    fn recv(&mut self, kind: MessageKind, timeout: Duration) -> Result<Option<Packet>> {
        self.log.borrow_mut().recv_timeouts.push(timeout);
        while let Some(message) = self.pending.pop_front() {
            if message.kind() == kind {
                return Ok(Some(Packet {
                    system_id: DEVICE_SYSTEM_ID,
                    component_id: DEVICE_COMPONENT_ID,
                    message,
                }));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closes += 1;
        Ok(())
    }
}
