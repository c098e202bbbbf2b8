//! Configuration file support
//!
//! Supports loading configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DissectError, Result};
use crate::link::MAX_FRAME_WIRE_LEN;

/// Root configuration structure
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Dissector core settings
    pub dissector: DissectorSettings,

    /// Capture front-end settings
    pub capture: CaptureSettings,
}

/// Settings for a single dissector instance
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DissectorSettings {
    /// Maximum number of live (source, destination) contexts before the
    /// least recently used one is recycled
    pub ctx_max: usize,

    /// Size of the rolling input buffer; also caps the raw-frame bytes
    /// accumulated per context
    pub buf_len: usize,
}

impl Default for DissectorSettings {
    fn default() -> Self {
        Self {
            ctx_max: 16,
            buf_len: 4096,
        }
    }
}

/// Settings for the pcap replay front-end
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// TCP/UDP port carrying DNP3 conversations
    pub port: u16,

    /// Also accept DNP3 over UDP datagrams
    pub udp: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            port: 20000,
            udp: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DissectError::Config(format!("failed to read config file: {}", e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DissectError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to a TOML string
    pub fn to_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DissectError::Config(format!("failed to serialize config: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.dissector.ctx_max == 0 {
            return Err(DissectError::Config("ctx_max must be at least 1".into()));
        }
        if self.dissector.buf_len < MAX_FRAME_WIRE_LEN {
            return Err(DissectError::Config(format!(
                "buf_len must hold at least one maximum-size link frame ({} bytes)",
                MAX_FRAME_WIRE_LEN
            )));
        }
        Ok(())
    }
}
