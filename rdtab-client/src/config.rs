//! Client configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use rdtab_core::{ColorDepth, SessionConfig};

use crate::sim::SimulatorConfig;

/// Top-level configuration for the session host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection profile for the remote host.
    pub connection: ConnectionProfile,
    /// Simulated-engine behavior.
    pub simulator: SimulatorConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// A saved connection profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProfile {
    /// Display name for the profile.
    pub name: String,
    /// Remote host address (IP or hostname).
    pub address: String,
    /// Remote port.
    pub port: u16,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Drive the session at full remote-screen size.
    pub full_screen: bool,
    /// Size the remote desktop to the local viewport.
    pub auto_fit: bool,
    /// Explicit desktop width (used when neither auto_fit nor full_screen).
    pub width: i32,
    /// Explicit desktop height.
    pub height: i32,
    /// Color depth in bits per pixel: 8, 16, 24, or 32.
    pub color_depth: ColorDepth,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionProfile::default(),
            simulator: SimulatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            name: "default".into(),
            address: "192.168.1.100".into(),
            port: 3389,
            username: "administrator".into(),
            password: String::new(),
            full_screen: false,
            auto_fit: true,
            width: 1280,
            height: 720,
            color_depth: ColorDepth::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

// ── Conversion ───────────────────────────────────────────────────

impl ConnectionProfile {
    /// Build the session configuration the controller consumes.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            full_screen: self.full_screen,
            auto_fit: self.auto_fit,
            width: self.width,
            height: self.height,
            color_depth: self.color_depth,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

}

// ── Tests ────────────────────────────────────────────────────────
