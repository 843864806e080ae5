//! Configuration for ipcbuf.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $IPCBUF_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ipcbuf/config.toml
//!   3. ~/.config/ipcbuf/config.toml
//!
//! A missing file is not an error; the defaults are enough to run.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;

use crate::drain::DEFAULT_MIN_BUFFER;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcbufConfig {
    pub paths: PathsConfig,
    pub network: NetworkConfig,
    pub drain: DrainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Filesystem entry created for the FIFO transport.
    pub fifo: PathBuf,
    /// Filesystem entry bound by local-domain sockets.
    pub socket: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Port bound by inet/inet6 sockets.
    pub port: u16,
    pub inet_addr: Ipv4Addr,
    pub inet6_addr: Ipv6Addr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Smallest read buffer used while draining.
    pub min_buffer: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IpcbufConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            network: NetworkConfig::default(),
            drain: DrainConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let pid = std::process::id();
        Self {
            fifo: std::env::temp_dir().join(format!("ipcbuf-{pid}.fifo")),
            socket: std::env::temp_dir().join(format!("ipcbuf-{pid}.sock")),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: 12345,
            inet_addr: Ipv4Addr::LOCALHOST,
            inet6_addr: Ipv6Addr::LOCALHOST,
        }
    }
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            min_buffer: DEFAULT_MIN_BUFFER,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ipcbuf")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {0}: {1:?}")]
    InvalidOverride(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl IpcbufConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            IpcbufConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("IPCBUF_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply IPCBUF_* overrides, looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IPCBUF_PATHS__FIFO") {
            self.paths.fifo = PathBuf::from(v);
        }
        if let Some(v) = lookup("IPCBUF_PATHS__SOCKET") {
            self.paths.socket = PathBuf::from(v);
        }
        if let Some(v) = lookup("IPCBUF_NETWORK__PORT") {
            self.network.port = v
                .parse()
                .map_err(|_| ConfigError::InvalidOverride("IPCBUF_NETWORK__PORT", v))?;
        }
        if let Some(v) = lookup("IPCBUF_DRAIN__MIN_BUFFER") {
            self.drain.min_buffer = v
                .parse()
                .map_err(|_| ConfigError::InvalidOverride("IPCBUF_DRAIN__MIN_BUFFER", v))?;
        }
        Ok(())
    }
}
