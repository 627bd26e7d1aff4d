//! Configuration system for mdcollab
//!
//! Reads config from ~/.config/mdcollab/config.toml. Every field has a
//! default, so a partial file (or none at all) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub ws_port: u16,
    pub http_port: u16,
    pub bind: String,
    /// Directory holding the built wasm client, served under /pkg
    pub assets_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_port: 9001,
            http_port: 8080,
            bind: "127.0.0.1".to_string(),
            assets_dir: PathBuf::from("crates/ui/pkg"),
        }
    }
}

/// Per-connection timing and flood limits
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Server-side cursor report window
    pub cursor_throttle_ms: u64,
    pub heartbeat_secs: u64,
    /// Close connections silent for this long
    pub idle_timeout_secs: u64,
    pub rate_burst: f64,
    /// Tokens per second
    pub rate_refill: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cursor_throttle_ms: 50,
            heartbeat_secs: 30,
            idle_timeout_secs: 300,
            rate_burst: 1000.0,
            rate_refill: 100.0,
        }
    }
}

impl SyncConfig {
    pub const fn cursor_window(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms)
    }

    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Room configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoomConfig {
    pub max_rooms: usize,
    /// Broadcast buffer per room before slow members lag
    pub channel_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_rooms: 64,
            channel_capacity: 256,
        }
    }
}

/// Full application configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub rooms: RoomConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    pub fn load() -> Self {
        let path = Self::default_config_path();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from_path(&path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            Self::default()
        })
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mdcollab")
            .join("config.toml")
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
