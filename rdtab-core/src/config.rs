//! Per-session connection settings.
//!
//! A [`SessionConfig`] is the immutable-per-attempt snapshot handed to a
//! [`SessionController`](crate::controller::SessionController) at
//! construction time. A resolution change picks a new effective desktop
//! size without mutating the config itself.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

// ── ColorDepth ───────────────────────────────────────────────────

/// Remote desktop color depth in bits per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ColorDepth {
    Bpp8,
    Bpp16,
    Bpp24,
    Bpp32,
}

impl ColorDepth {
    /// Bits per pixel as the engine expects it.
    pub const fn bits(self) -> u8 {
        match self {
            ColorDepth::Bpp8 => 8,
            ColorDepth::Bpp16 => 16,
            ColorDepth::Bpp24 => 24,
            ColorDepth::Bpp32 => 32,
        }
    }
}

impl Default for ColorDepth {
    fn default() -> Self {
        ColorDepth::Bpp32
    }
}

impl TryFrom<u8> for ColorDepth {
    type Error = SessionError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(ColorDepth::Bpp8),
            16 => Ok(ColorDepth::Bpp16),
            24 => Ok(ColorDepth::Bpp24),
            32 => Ok(ColorDepth::Bpp32),
            _ => Err(SessionError::InvalidConfig(
                "color depth must be 8, 16, 24 or 32",
            )),
        }
    }
}

impl From<ColorDepth> for u8 {
    fn from(depth: ColorDepth) -> u8 {
        depth.bits()
    }
}

// ── SessionConfig ────────────────────────────────────────────────

/// Connection settings for one remote session.
///
/// The password is held cleartext, in memory only, for the lifetime of
/// the owning controller. Persistence and encryption of stored
/// connection records live outside this crate.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host name or IP.
    pub address: String,
    /// Remote port (1..=65535).
    pub port: u16,
    /// Login user name.
    pub username: String,
    /// Cleartext password; may be empty.
    pub password: String,
    /// Use the full physical screen resolution.
    pub full_screen: bool,
    /// Size the remote desktop to the current viewport.
    pub auto_fit: bool,
    /// Explicit desktop width; non-positive falls back to the default.
    pub width: i32,
    /// Explicit desktop height; non-positive falls back to the default.
    pub height: i32,
    /// Remote color depth.
    pub color_depth: ColorDepth,
}

impl SessionConfig {
    /// Validate fields that must be checked before any connect attempt.
    ///
    /// Surfaced synchronously from the controller constructor so a bad
    /// config never crosses the event boundary.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.address.trim().is_empty() {
            return Err(SessionError::InvalidConfig("address is empty"));
        }
        if self.port == 0 {
            return Err(SessionError::InvalidConfig("port must be 1..=65535"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            address: "192.168.1.50".into(),
            port: 3389,
            username: "admin".into(),
            password: String::new(),
            full_screen: false,
            auto_fit: false,
            width: 1280,
            height: 720,
            color_depth: ColorDepth::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn empty_address_rejected() {
        let mut cfg = config();
        cfg.address = "   ".into();
        assert!(matches!(
            cfg.validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_port_rejected() {
        let mut cfg = config();
        cfg.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn color_depth_round_trip() {
        for bits in [8u8, 16, 24, 32] {
            let depth = ColorDepth::try_from(bits).unwrap();
            assert_eq!(depth.bits(), bits);
        }
        assert!(ColorDepth::try_from(15).is_err());
    }
}
