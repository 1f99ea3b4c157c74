//! Configuration management.

use anyhow::{Context, Result};
use pocket_print_core::{
    encoder::DEFAULT_COMPRESSION, transport::DEFAULT_BAUD_RATE, BackendKind, ChecksumPolicy,
    PngOptions, SessionConfig, Shades,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Serial link configuration
    #[serde(default)]
    pub serial: SerialConfig,

    /// Print session configuration
    #[serde(default)]
    pub session: SessionSettings,

    /// Image output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial port path (USB CDC or rfcomm)
    #[serde(default = "default_device")]
    pub device: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Delay before reopening a failed or dropped port, in milliseconds
    #[serde(default = "default_reconnect")]
    pub reconnect: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            baud_rate: default_baud_rate(),
            reconnect: default_reconnect(),
        }
    }
}

/// Print session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Idle time that ends a print job, in milliseconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,

    /// Checksum policy: "strict" or "lenient"
    #[serde(default = "default_checksum_policy")]
    pub checksum_policy: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            checksum_policy: default_checksum_policy(),
        }
    }
}

/// Image output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Gallery directory for saved prints
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// PNG backend: "indexed" or "rgba"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// zlib compression level (0-9)
    #[serde(default = "default_compression")]
    pub compression: u32,

    /// Shade colors, darkest first
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,

    /// Also write a `.txt` file with the PNG as a data URI
    #[serde(default)]
    pub data_uri: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            backend: default_backend(),
            compression: default_compression(),
            palette: default_palette(),
            data_uri: false,
        }
    }
}

// Default value functions
fn default_device() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_reconnect() -> u64 {
    2000
}

fn default_idle_timeout() -> u64 {
    500
}

fn default_checksum_policy() -> String {
    "strict".to_string()
}

fn default_dir() -> PathBuf {
    PathBuf::from("gallery")
}

fn default_backend() -> String {
    "indexed".to_string()
}

fn default_compression() -> u32 {
    DEFAULT_COMPRESSION
}

fn default_palette() -> Vec<String> {
    Shades::grayscale().to_hex()
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
        Ok(())
    }

    /// Builds the decoder session settings.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let checksum_policy: ChecksumPolicy = self
            .session
            .checksum_policy
            .parse()
            .context("Invalid session.checksum_policy")?;
        let backend: BackendKind = self
            .output
            .backend
            .parse()
            .context("Invalid output.backend")?;
        let shades =
            Shades::from_hex(self.output.palette.as_slice()).context("Invalid output.palette")?;

        Ok(SessionConfig {
            idle_timeout: Duration::from_millis(self.session.idle_timeout),
            checksum_policy,
            png: PngOptions {
                backend,
                shades,
                compression: self.output.compression,
            },
        })
    }
}
