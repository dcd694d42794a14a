use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

/// Port the simulation controller connects to unless configured otherwise
pub const DEFAULT_PORT: u16 = 27117;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Port must be non-zero")]
    ZeroPort,

    #[error("Queue capacity must be non-zero")]
    ZeroQueueCapacity,

    #[error("Invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("File prefix must not be empty")]
    EmptyFilePrefix,
}

/// Runtime configuration, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface the command channel listens on
    pub bind_address: String,
    /// Command channel port
    pub port: u16,
    /// Folder session files are written to
    pub output_dir: PathBuf,
    /// Prefix of exported file names
    pub file_prefix: String,
    /// Quiet time after which an unterminated command fragment is emitted
    pub flush_after_ms: u64,
    /// Capacity of the session event queue
    pub queue_capacity: usize,
    /// Keep finalized sessions in the SQLite archive
    pub archive: bool,
    /// First line of the dwell report file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_header: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            output_dir: default_output_dir(),
            file_prefix: "gazelog".to_string(),
            flush_after_ms: 100,
            queue_capacity: 64,
            archive: true,
            report_header: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Load from `path`, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.file_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyFilePrefix);
        }
        self.listen_addr().map(|_| ())
    }

    /// # Errors
    ///
    /// Returns an error if `bind_address` is not an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, self.port))
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }

    /// # Errors
    ///
    /// Returns an error if a value cannot be represented in TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    #[must_use]
    pub fn flush_after(&self) -> Duration {
        Duration::from_millis(self.flush_after_ms)
    }
}

/// Get the local data directory for gazelog.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("gazelog");
    Ok(path)
}

/// Get the path of `config.toml`.
///
/// # Errors
///
/// Returns an error if the config directory cannot be determined.
pub fn get_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Failed to get config dir"))?;
    path.push("gazelog");
    path.push("config.toml");
    Ok(path)
}

fn default_output_dir() -> PathBuf {
    get_data_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("sessions")
}
