//! Serial endpoint discovery and descriptor matching.
//!
//! Autopilot boards and their USB-UART adapters are recognised by shell-style
//! glob patterns applied to the endpoint name and to a descriptor string.
//! For USB ports the descriptor follows `/dev/serial/by-id` naming
//! (`usb-<manufacturer>_<product>_<serial>`, spaces replaced by underscores),
//! which is what the built-in patterns were written against.

#[cfg(feature = "native")]
use log::{debug, trace};

/// Built-in descriptor patterns for known autopilot adapters, in priority
/// order.
pub const PREFERRED_PATTERNS: &[&str] = &[
    "*FTDI*",
    "*Arduino_Mega_2560*",
    "*3D_Robotics*",
    "*USB_to_UART*",
    "*PX4*",
    "*FMU*",
    "*Gumstix*",
];

/// A serial endpoint present on the host. The USB fields stay `None` for
/// built-in UARTs and for platforms that do not report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DetectedPort {
    /// Path or name handed to the serial driver ("/dev/ttyACM0", "COM3").
    pub name: String,
    /// USB vendor id.
    pub vid: Option<u16>,
    /// USB product id.
    pub pid: Option<u16>,
    /// USB manufacturer string.
    pub manufacturer: Option<String>,
    /// USB product string.
    pub product: Option<String>,
    /// USB serial number string.
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Endpoint without USB metadata.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Human-readable descriptor used for pattern matching and logging.
    pub fn descriptor(&self) -> String {
        if self.vid.is_none() && self.manufacturer.is_none() && self.product.is_none() {
            return self.name.clone();
        }

        let parts: Vec<&str> = [&self.manufacturer, &self.product, &self.serial]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();

        let body = if parts.is_empty() {
            match (self.vid, self.pid) {
                (Some(vid), Some(pid)) => format!("{vid:04X}_{pid:04X}"),
                _ => return self.name.clone(),
            }
        } else {
            parts.join("_")
        };

        format!("usb-{}", body.replace(' ', "_"))
    }

    /// Check if the endpoint name or descriptor matches any of `patterns`.
    pub fn matches_any<S: AsRef<str>>(&self, patterns: &[S]) -> bool {
        let descriptor = self.descriptor();
        patterns.iter().any(|p| {
            let p = p.as_ref();
            glob_match(p, &self.name) || glob_match(p, &descriptor)
        })
    }
}

/// Match `text` against a shell glob supporting `*` and `?`.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                backtrack = Some((p + 1, t));
                p += 1;
            },
            Some('?') => {
                p += 1;
                t += 1;
            },
            Some(c) if c == text[t] => {
                p += 1;
                t += 1;
            },
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                },
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Enumerate host serial endpoints, filling in USB metadata where the OS
/// reports it.
#[cfg(feature = "native")]
pub fn detect_ports() -> crate::error::Result<Vec<DetectedPort>> {
    let ports = serialport::available_ports()?;
    debug!("{} serial endpoint(s) present", ports.len());
    Ok(ports.into_iter().map(DetectedPort::from).collect())
}

#[cfg(feature = "native")]
impl From<serialport::SerialPortInfo> for DetectedPort {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let serialport::SerialPortType::UsbPort(usb) = info.port_type else {
            return Self::new(info.port_name);
        };
        let port = Self {
            vid: Some(usb.vid),
            pid: Some(usb.pid),
            manufacturer: usb.manufacturer,
            product: usb.product,
            serial: usb.serial_number,
            ..Self::new(info.port_name)
        };
        trace!("{} is USB {:04X}:{:04X} {}", port.name, usb.vid, usb.pid, port.descriptor());
        port
    }
}

/// Format a list of detected endpoints for display.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let ids = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" ({vid:04X}:{pid:04X})")
            } else {
                String::new()
            };
            let descriptor = port.descriptor();
            if descriptor == port.name {
                format!("{}{ids}", port.name)
            } else {
                format!("{}{ids} - {descriptor}", port.name)
            }
        })
        .collect()
}
