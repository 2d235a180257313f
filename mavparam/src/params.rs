//! Parameter file parsing and value encoding.
//!
//! A parameter file holds one `<name> <value>` pair per line, separated by
//! whitespace. A value containing `.` is a 32-bit float; anything else is a
//! 32-bit signed integer. Both travel in the float slot of PARAM_SET, so
//! integers are bit-cast rather than converted.

use crate::error::{Error, Result};
use crate::mavlink::message::{MAV_PARAM_TYPE_INT32, MAV_PARAM_TYPE_REAL32, PARAM_ID_LEN};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Wire type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum ParamKind {
    /// Signed 32-bit integer.
    Int32,
    /// 32-bit float.
    Real32,
}

impl ParamKind {
    /// Infer the kind from the value text.
    pub fn infer(raw: &str) -> Self {
        if raw.contains('.') {
            Self::Real32
        } else {
            Self::Int32
        }
    }

    /// MAVLink `MAV_PARAM_TYPE` code.
    pub const fn mav_type(self) -> u8 {
        match self {
            Self::Int32 => MAV_PARAM_TYPE_INT32,
            Self::Real32 => MAV_PARAM_TYPE_REAL32,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32 => write!(f, "INT32"),
            Self::Real32 => write!(f, "REAL32"),
        }
    }
}

/// The 4-byte pattern carried in the float slot of PARAM_SET / PARAM_VALUE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EncodedValue(pub u32);

impl EncodedValue {
    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// One validated line of a parameter file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParameterRecord {
    /// 1-based line number.
    pub line: usize,
    /// Parameter name (at most 16 bytes).
    pub name: String,
    /// Value text as written in the file.
    pub raw: String,
    /// Inferred wire type.
    pub kind: ParamKind,
    /// Encoded value bits.
    pub value: EncodedValue,
}

impl ParameterRecord {
    /// Parse and validate one line.
    pub fn parse_line(line: usize, content: &str) -> Result<Self> {
        let mut tokens = content.split_whitespace();
        let (Some(name), Some(raw), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::MalformedParameterLine {
                line,
                content: content.to_string(),
            });
        };

        let kind = ParamKind::infer(raw);
        let value = encode(kind, raw).ok_or_else(|| Error::InvalidParameterValue {
            line,
            name: name.to_string(),
            value: raw.to_string(),
        })?;

        Ok(Self {
            line,
            name: name.to_string(),
            raw: raw.to_string(),
            kind,
            value,
        })
    }

    /// Whether the name fits the 16-byte `param_id` field. Longer names are
    /// cut on the wire, so the device can never echo them back intact.
    pub fn fits_param_id(&self) -> bool {
        self.name.len() <= PARAM_ID_LEN
    }
}

fn encode(kind: ParamKind, raw: &str) -> Option<EncodedValue> {
    match kind {
        ParamKind::Real32 => raw.parse::<f32>().ok().map(|v| EncodedValue(v.to_bits())),
        ParamKind::Int32 => raw
            .parse::<i32>()
            .ok()
            .map(|v| EncodedValue(u32::from_ne_bytes(v.to_ne_bytes()))),
    }
}

/// Streaming reader yielding one record per line.
///
/// Lines are only read when the next record is requested, so a consumer that
/// stops at the first error never looks past the offending line. The reader
/// yields nothing after an error.
pub struct ParameterReader<R> {
    reader: R,
    line: usize,
    done: bool,
}

impl<R: BufRead> ParameterReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            done: false,
        }
    }

    /// Number of lines consumed so far.
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl ParameterReader<BufReader<File>> {
    /// Open a parameter file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for ParameterReader<R> {
    type Item = Result<ParameterRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut content = String::new();
        match self.reader.read_line(&mut content) {
            Ok(0) => {
                self.done = true;
                None
            },
            Ok(_) => {
                self.line += 1;
                let content = content.trim_end_matches(['\n', '\r']);
                let record = ParameterRecord::parse_line(self.line, content);
                self.done = record.is_err();
                Some(record)
            },
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            },
        }
    }
}
