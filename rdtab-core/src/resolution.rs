//! Desktop size selection and normalization.
//!
//! The engine cannot resize its virtual desktop after connect, so the
//! effective size must be fully resolved before every engine build:
//! picked from viewport / screen / explicit settings, clamped to the
//! range the protocol supports, and floored to even pixel counts.

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// Smallest desktop the engine accepts.
pub const MIN_DESKTOP: DesktopSize = DesktopSize {
    width: 800,
    height: 600,
};

/// Largest desktop the engine accepts.
pub const MAX_DESKTOP: DesktopSize = DesktopSize {
    width: 4096,
    height: 2160,
};

/// Fallback when neither viewport nor screen metrics are usable.
pub const DEFAULT_DESKTOP: DesktopSize = DesktopSize {
    width: 1920,
    height: 1080,
};

/// Viewport sizes at or below this are treated as not-yet-laid-out.
const MIN_USABLE_VIEWPORT: u32 = 100;

// ── DesktopSize ──────────────────────────────────────────────────

/// A remote desktop size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesktopSize {
    pub width: u32,
    pub height: u32,
}

impl DesktopSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp into the supported range, then floor each dimension to an
    /// even number (some GPUs reject odd desktop widths).
    pub fn normalized(self) -> Self {
        let width = self.width.clamp(MIN_DESKTOP.width, MAX_DESKTOP.width);
        let height = self.height.clamp(MIN_DESKTOP.height, MAX_DESKTOP.height);
        Self {
            width: width - width % 2,
            height: height - height % 2,
        }
    }
}

impl std::fmt::Display for DesktopSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ── DisplayMetrics ───────────────────────────────────────────────

/// Sizes the UI collaborator knows about, passed in as plain data so
/// the core never reads shared process state.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayMetrics {
    /// Current pixel size of the viewport the engine renders into, if
    /// the container has been laid out.
    pub viewport: Option<DesktopSize>,
    /// Physical screen resolution (unscaled by DPI), if known.
    pub screen: Option<DesktopSize>,
}

impl DisplayMetrics {
    /// Viewport size, when it is large enough to be a real layout and
    /// not an initial placeholder.
    pub fn usable_viewport(&self) -> Option<DesktopSize> {
        self.viewport
            .filter(|v| v.width > MIN_USABLE_VIEWPORT && v.height > MIN_USABLE_VIEWPORT)
    }

    fn screen_or_default(&self) -> DesktopSize {
        match self.screen {
            Some(s) if s.width > 0 && s.height > 0 => s,
            _ => DEFAULT_DESKTOP,
        }
    }
}

// ── Selection ────────────────────────────────────────────────────

/// Resolve the desktop size for an initial connect.
///
/// Priority: auto-fit uses the viewport when it is usable and otherwise
/// falls back to the physical screen; full-screen uses the physical
/// screen; anything else uses the explicit config size with
/// non-positive values defaulted. The result is always normalized.
pub fn select_desktop_size(config: &SessionConfig, metrics: &DisplayMetrics) -> DesktopSize {
    let size = if config.auto_fit {
        metrics
            .usable_viewport()
            .unwrap_or_else(|| metrics.screen_or_default())
    } else if config.full_screen {
        metrics.screen_or_default()
    } else {
        DesktopSize::new(
            if config.width > 0 {
                config.width as u32
            } else {
                DEFAULT_DESKTOP.width
            },
            if config.height > 0 {
                config.height as u32
            } else {
                DEFAULT_DESKTOP.height
            },
        )
    };
    size.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColorDepth;

    fn config() -> SessionConfig {
        SessionConfig {
            address: "host".into(),
            port: 3389,
            username: "user".into(),
            password: String::new(),
            full_screen: false,
            auto_fit: false,
            width: 1280,
            height: 720,
            color_depth: ColorDepth::default(),
        }
    }

    #[test]
    fn normalize_clamps_oversized() {
        assert_eq!(
            DesktopSize::new(4200, 2200).normalized(),
            DesktopSize::new(4096, 2160)
        );
    }

    #[test]
    fn normalize_floors_to_even() {
        assert_eq!(
            DesktopSize::new(801, 601).normalized(),
            DesktopSize::new(800, 600)
        );
        assert_eq!(
            DesktopSize::new(1367, 769).normalized(),
            DesktopSize::new(1366, 768)
        );
    }

    #[test]
    fn normalize_clamps_undersized_then_evens() {
        assert_eq!(
            DesktopSize::new(799, 599).normalized(),
            DesktopSize::new(800, 600)
        );
        assert_eq!(DesktopSize::new(0, 0).normalized(), MIN_DESKTOP);
    }

    #[test]
    fn explicit_size_used_when_positive() {
        let cfg = config();
        let size = select_desktop_size(&cfg, &DisplayMetrics::default());
        assert_eq!(size, DesktopSize::new(1280, 720));
    }

    #[test]
    fn explicit_non_positive_defaults() {
        let mut cfg = config();
        cfg.width = 0;
        cfg.height = -1;
        let size = select_desktop_size(&cfg, &DisplayMetrics::default());
        assert_eq!(size, DEFAULT_DESKTOP);
    }

    #[test]
    fn auto_fit_prefers_viewport() {
        let mut cfg = config();
        cfg.auto_fit = true;
        let metrics = DisplayMetrics {
            viewport: Some(DesktopSize::new(1602, 902)),
            screen: Some(DesktopSize::new(2560, 1440)),
        };
        assert_eq!(
            select_desktop_size(&cfg, &metrics),
            DesktopSize::new(1602, 902)
        );
    }

    #[test]
    fn auto_fit_ignores_unlaid_out_viewport() {
        let mut cfg = config();
        cfg.auto_fit = true;
        let metrics = DisplayMetrics {
            viewport: Some(DesktopSize::new(100, 30)),
            screen: Some(DesktopSize::new(2560, 1440)),
        };
        assert_eq!(
            select_desktop_size(&cfg, &metrics),
            DesktopSize::new(2560, 1440)
        );
    }

    #[test]
    fn full_screen_uses_screen_then_default() {
        let mut cfg = config();
        cfg.full_screen = true;
        let metrics = DisplayMetrics {
            viewport: None,
            screen: Some(DesktopSize::new(3840, 2160)),
        };
        assert_eq!(
            select_desktop_size(&cfg, &metrics),
            DesktopSize::new(3840, 2160)
        );
        assert_eq!(
            select_desktop_size(&cfg, &DisplayMetrics::default()),
            DEFAULT_DESKTOP
        );
    }
}
