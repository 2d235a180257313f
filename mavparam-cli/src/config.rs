//! TOML settings for the `mavparam` CLI.
//!
//! Sources, strongest first:
//! 1. Command-line flags
//! 2. Environment variables (MAVPARAM_*)
//! 3. Local config file (./mavparam.toml)
//! 4. Global config file (~/.config/mavparam/config.toml)
//!
//! `--config <PATH>` replaces layers 3 and 4 with a single file.

use anyhow::Context;
use directories::ProjectDirs;
use log::{debug, warn};
use mavparam::{NegotiatorConfig, UploaderConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local configuration file name.
pub const LOCAL_CONFIG_FILE: &str = "mavparam.toml";

/// Endpoint selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortConfig {
    /// Serial endpoint to use instead of auto-detection.
    pub serial: Option<String>,
    /// Extra descriptor globs appended to the built-in list.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Bit-rate negotiation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Rates to probe, in order.
    pub baud_rates: Option<Vec<u32>>,
    /// Heartbeat reply timeout per rate, in seconds.
    pub heartbeat_timeout_secs: Option<u64>,
}

/// Parameter upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Attempts per parameter.
    pub max_attempts: Option<u32>,
    /// Echo timeout per attempt, in milliseconds.
    pub ack_timeout_ms: Option<u64>,
    /// Reboot the autopilot after the upload pass.
    pub reboot: Option<bool>,
}

/// Everything a config file can set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Endpoint selection.
    #[serde(default)]
    pub port: PortConfig,
    /// Bit-rate negotiation.
    #[serde(default)]
    pub link: LinkConfig,
    /// Parameter upload.
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Layered configuration: global file, then `./mavparam.toml` on top.
    pub fn load() -> Self {
        let layers = Self::global_config_path()
            .into_iter()
            .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)));

        layers.fold(Self::default(), |mut config, path| {
            if let Some(layer) = Self::read_layer_or_warn(&path) {
                config.merge(layer);
            }
            config
        })
    }

    /// Configuration from the single file given with `--config`.
    pub fn load_from_path(path: &Path) -> Self {
        Self::read_layer_or_warn(path).unwrap_or_else(|| {
            warn!("No usable config at {}, using defaults", path.display());
            Self::default()
        })
    }

    fn read_layer_or_warn(path: &Path) -> Option<Self> {
        match Self::read_layer(path) {
            Ok(Some(layer)) => {
                debug!("Config layer {}", path.display());
                Some(layer)
            },
            Ok(None) => None,
            Err(e) => {
                warn!("{e:#}");
                None
            },
        }
    }

    /// Parse one TOML file; a missing file is not an error.
    fn read_layer(path: &Path) -> anyhow::Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            },
        };
        let layer = toml::from_str(&text).with_context(|| format!("ignoring {}", path.display()))?;
        Ok(Some(layer))
    }

    /// Per-user directory holding `config.toml`.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mavparam").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Per-user `config.toml`.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Apply `other` on top: set scalars win, patterns accumulate.
    fn merge(&mut self, other: Self) {
        overlay(&mut self.port.serial, other.port.serial);
        self.port.patterns.extend(other.port.patterns);

        overlay(&mut self.link.baud_rates, other.link.baud_rates);
        overlay(&mut self.link.heartbeat_timeout_secs, other.link.heartbeat_timeout_secs);

        overlay(&mut self.upload.max_attempts, other.upload.max_attempts);
        overlay(&mut self.upload.ack_timeout_ms, other.upload.ack_timeout_ms);
        overlay(&mut self.upload.reboot, other.upload.reboot);
    }

    /// Negotiation options, with library defaults for unset keys.
    pub fn negotiator_config(&self) -> NegotiatorConfig {
        let mut config = NegotiatorConfig::default();
        if let Some(rates) = &self.link.baud_rates {
            config.baud_rates.clone_from(rates);
        }
        if let Some(secs) = self.link.heartbeat_timeout_secs {
            config.heartbeat_timeout = Duration::from_secs(secs);
        }
        config
    }

    /// Upload options, with library defaults for unset keys.
    pub fn uploader_config(&self) -> UploaderConfig {
        let mut config = UploaderConfig::default();
        if let Some(attempts) = self.upload.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(ms) = self.upload.ack_timeout_ms {
            config.ack_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Whether to reboot after uploading (default on).
    pub fn reboot(&self) -> bool {
        self.upload.reboot.unwrap_or(true)
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
