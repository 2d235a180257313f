//! The handful of MAVLink common-dialect messages the uploader exchanges.
//!
//! Payload layouts follow MAVLink wire order (fields sorted by size, largest
//! first), little-endian.
//!
//! ```text
//! HEARTBEAT (0)       custom_mode:u32 type:u8 autopilot:u8 base_mode:u8
//!                     system_status:u8 mavlink_version:u8              = 9
//! PARAM_VALUE (22)    param_value:f32 param_count:u16 param_index:u16
//!                     param_id:char[16] param_type:u8                  = 25
//! PARAM_SET (23)      param_value:f32 target_system:u8 target_component:u8
//!                     param_id:char[16] param_type:u8                  = 23
//! COMMAND_LONG (76)   param1..7:f32 command:u16 target_system:u8
//!                     target_component:u8 confirmation:u8              = 33
//! ```
//!
//! Parameter values are carried as raw 32-bit patterns so that integer
//! parameters survive the float slot bit-for-bit.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// `MAV_TYPE_GCS`.
pub const MAV_TYPE_GCS: u8 = 6;
/// `MAV_AUTOPILOT_INVALID`.
pub const MAV_AUTOPILOT_INVALID: u8 = 8;
/// MAVLink protocol version advertised in heartbeats.
pub const MAVLINK_VERSION: u8 = 3;
/// `MAV_PARAM_TYPE_INT32`.
pub const MAV_PARAM_TYPE_INT32: u8 = 6;
/// `MAV_PARAM_TYPE_REAL32`.
pub const MAV_PARAM_TYPE_REAL32: u8 = 9;
/// `MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN`.
pub const MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN: u16 = 246;

/// Length of the `param_id` field.
pub const PARAM_ID_LEN: usize = 16;

/// Message types known to this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// HEARTBEAT (#0).
    Heartbeat,
    /// PARAM_VALUE (#22).
    ParamValue,
    /// PARAM_SET (#23).
    ParamSet,
    /// COMMAND_LONG (#76).
    CommandLong,
}

impl MessageKind {
    /// Message id on the wire.
    pub const fn id(self) -> u32 {
        match self {
            Self::Heartbeat => 0,
            Self::ParamValue => 22,
            Self::ParamSet => 23,
            Self::CommandLong => 76,
        }
    }

    /// CRC extra byte seeded into the frame checksum.
    pub const fn crc_extra(self) -> u8 {
        match self {
            Self::Heartbeat => 50,
            Self::ParamValue => 220,
            Self::ParamSet => 168,
            Self::CommandLong => 152,
        }
    }

    /// Full (untruncated) payload length.
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Heartbeat => 9,
            Self::ParamValue => 25,
            Self::ParamSet => 23,
            Self::CommandLong => 33,
        }
    }

    /// Look up a message kind by wire id.
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Heartbeat),
            22 => Some(Self::ParamValue),
            23 => Some(Self::ParamSet),
            76 => Some(Self::CommandLong),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Heartbeat => "HEARTBEAT",
            Self::ParamValue => "PARAM_VALUE",
            Self::ParamSet => "PARAM_SET",
            Self::CommandLong => "COMMAND_LONG",
        };
        f.write_str(name)
    }
}

/// HEARTBEAT payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// Autopilot-specific mode bits.
    pub custom_mode: u32,
    /// Vehicle or component type (`MAV_TYPE`).
    pub mav_type: u8,
    /// Autopilot class (`MAV_AUTOPILOT`).
    pub autopilot: u8,
    /// System mode bitmap.
    pub base_mode: u8,
    /// System status flag.
    pub system_status: u8,
    /// MAVLink protocol version.
    pub mavlink_version: u8,
}

impl Heartbeat {
    /// Heartbeat announcing a ground station with no autopilot.
    pub fn ground_station() -> Self {
        Self {
            custom_mode: 0,
            mav_type: MAV_TYPE_GCS,
            autopilot: MAV_AUTOPILOT_INVALID,
            base_mode: 0,
            system_status: 0,
            mavlink_version: MAVLINK_VERSION,
        }
    }
}

/// PARAM_VALUE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue {
    /// Parameter name.
    pub param_id: String,
    /// Raw bits of the float slot.
    pub value_bits: u32,
    /// `MAV_PARAM_TYPE` of the value.
    pub param_type: u8,
    /// Total number of parameters on the device.
    pub param_count: u16,
    /// Index of this parameter.
    pub param_index: u16,
}

/// PARAM_SET payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSet {
    /// Target system id.
    pub target_system: u8,
    /// Target component id.
    pub target_component: u8,
    /// Parameter name (at most 16 bytes).
    pub param_id: String,
    /// Raw bits of the float slot.
    pub value_bits: u32,
    /// `MAV_PARAM_TYPE` of the value.
    pub param_type: u8,
}

/// COMMAND_LONG payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandLong {
    /// Target system id.
    pub target_system: u8,
    /// Target component id.
    pub target_component: u8,
    /// Command id (`MAV_CMD`).
    pub command: u16,
    /// Confirmation counter.
    pub confirmation: u8,
    /// Command parameters 1-7.
    pub params: [f32; 7],
}

impl CommandLong {
    /// Reboot the autopilot (`MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN`, param1 = 1).
    pub fn reboot_autopilot(target_system: u8, target_component: u8) -> Self {
        Self {
            target_system,
            target_component,
            command: MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN,
            confirmation: 0,
            params: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        }
    }
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// HEARTBEAT.
    Heartbeat(Heartbeat),
    /// PARAM_VALUE.
    ParamValue(ParamValue),
    /// PARAM_SET.
    ParamSet(ParamSet),
    /// COMMAND_LONG.
    CommandLong(CommandLong),
}

impl Message {
    /// Kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Heartbeat(_) => MessageKind::Heartbeat,
            Self::ParamValue(_) => MessageKind::ParamValue,
            Self::ParamSet(_) => MessageKind::ParamSet,
            Self::CommandLong(_) => MessageKind::CommandLong,
        }
    }

    /// Serialize the payload (full length, no truncation).
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.kind().payload_len()];

        match self {
            Self::Heartbeat(hb) => {
                LittleEndian::write_u32(&mut buf[0..4], hb.custom_mode);
                buf[4] = hb.mav_type;
                buf[5] = hb.autopilot;
                buf[6] = hb.base_mode;
                buf[7] = hb.system_status;
                buf[8] = hb.mavlink_version;
            },
            Self::ParamValue(pv) => {
                LittleEndian::write_u32(&mut buf[0..4], pv.value_bits);
                LittleEndian::write_u16(&mut buf[4..6], pv.param_count);
                LittleEndian::write_u16(&mut buf[6..8], pv.param_index);
                write_param_id(&mut buf[8..24], &pv.param_id);
                buf[24] = pv.param_type;
            },
            Self::ParamSet(ps) => {
                LittleEndian::write_u32(&mut buf[0..4], ps.value_bits);
                buf[4] = ps.target_system;
                buf[5] = ps.target_component;
                write_param_id(&mut buf[6..22], &ps.param_id);
                buf[22] = ps.param_type;
            },
            Self::CommandLong(cmd) => {
                for (i, param) in cmd.params.iter().enumerate() {
                    LittleEndian::write_f32(&mut buf[i * 4..i * 4 + 4], *param);
                }
                LittleEndian::write_u16(&mut buf[28..30], cmd.command);
                buf[30] = cmd.target_system;
                buf[31] = cmd.target_component;
                buf[32] = cmd.confirmation;
            },
        }

        buf
    }

    /// Decode a payload of the given kind.
    ///
    /// Short payloads (MAVLink 2 trailing-zero truncation) are zero-extended;
    /// bytes past the known layout (extension fields) are ignored.
    pub fn decode(kind: MessageKind, payload: &[u8]) -> Result<Self> {
        let len = kind.payload_len();
        if payload.is_empty() {
            return Err(Error::Protocol(format!("empty {kind} payload")));
        }

        let mut buf = vec![0u8; len];
        let n = payload.len().min(len);
        buf[..n].copy_from_slice(&payload[..n]);

        let message = match kind {
            MessageKind::Heartbeat => Self::Heartbeat(Heartbeat {
                custom_mode: LittleEndian::read_u32(&buf[0..4]),
                mav_type: buf[4],
                autopilot: buf[5],
                base_mode: buf[6],
                system_status: buf[7],
                mavlink_version: buf[8],
            }),
            MessageKind::ParamValue => Self::ParamValue(ParamValue {
                value_bits: LittleEndian::read_u32(&buf[0..4]),
                param_count: LittleEndian::read_u16(&buf[4..6]),
                param_index: LittleEndian::read_u16(&buf[6..8]),
                param_id: read_param_id(&buf[8..24]),
                param_type: buf[24],
            }),
            MessageKind::ParamSet => Self::ParamSet(ParamSet {
                value_bits: LittleEndian::read_u32(&buf[0..4]),
                target_system: buf[4],
                target_component: buf[5],
                param_id: read_param_id(&buf[6..22]),
                param_type: buf[22],
            }),
            MessageKind::CommandLong => {
                let mut params = [0.0f32; 7];
                for (i, param) in params.iter_mut().enumerate() {
                    *param = LittleEndian::read_f32(&buf[i * 4..i * 4 + 4]);
                }
                Self::CommandLong(CommandLong {
                    params,
                    command: LittleEndian::read_u16(&buf[28..30]),
                    target_system: buf[30],
                    target_component: buf[31],
                    confirmation: buf[32],
                })
            },
        };

        Ok(message)
    }
}

/// Write a NUL-padded `param_id`; names longer than the field are cut.
fn write_param_id(dst: &mut [u8], name: &str) {
    let bytes = name.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
}

/// Read a `param_id`, stopping at the first NUL.
fn read_param_id(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}
