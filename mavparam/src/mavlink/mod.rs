//! Minimal MAVLink codec.
//!
//! Only what a parameter upload needs: v1 encoding, v1/v2 decoding, and the
//! HEARTBEAT, PARAM_VALUE, PARAM_SET and COMMAND_LONG messages.

pub mod crc;
pub mod frame;
pub mod message;

pub use frame::{Frame, FrameParser};
pub use message::{CommandLong, Heartbeat, Message, MessageKind, ParamSet, ParamValue};
