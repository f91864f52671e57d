//! The display-engine contract.
//!
//! The engine is an opaque remote-display client: configured once,
//! connected once, then replaced wholesale. It cannot be reconfigured
//! or resized in place — a resolution change or a retry always tears
//! the old instance down and builds a new one.
//!
//! Engines may do their I/O on internal threads, but every notification
//! must be delivered through the event sender handed over at build
//! time, stamped with the instance generation it was built with. The
//! controller drains that channel on its own event loop and discards
//! events from retired generations.

use tokio::sync::mpsc;

use crate::config::{ColorDepth, SessionConfig};
use crate::error::SessionError;
use crate::resolution::DesktopSize;

/// Monotonic id for one engine instance owned by a controller.
///
/// Bumped every time a new instance is built, so notifications from a
/// torn-down instance can never perturb its successor.
pub type EngineGeneration = u64;

// ── Events ───────────────────────────────────────────────────────

/// Asynchronous notifications an engine emits over its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The connection is established and the remote desktop is live.
    Connected,
    /// Authentication finished; arrives after `Connected`.
    LoginComplete,
    /// The connection ended, with the engine's vendor reason code.
    Disconnected { reason: u32 },
    /// Unrecoverable engine failure, on a channel distinct from
    /// ordinary disconnects.
    FatalError { code: u32 },
}

/// Sender half an engine uses to deliver its notifications.
pub type EngineEventSender = mpsc::UnboundedSender<(EngineGeneration, EngineEvent)>;

// ── EngineSpec ───────────────────────────────────────────────────

/// Everything an engine needs to establish one connection.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Fully resolved desktop size (already clamped and evened).
    pub desktop: DesktopSize,
    pub color_depth: ColorDepth,
}

impl EngineSpec {
    /// Build a spec from a session config and a resolved desktop size.
    pub fn from_config(config: &SessionConfig, desktop: DesktopSize) -> Self {
        Self {
            address: config.address.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            desktop,
            color_depth: config.color_depth,
        }
    }
}

// ── DisplayEngine ────────────────────────────────────────────────

/// One opaque connection object. Single use.
///
/// `connect` and `disconnect` only issue the request; completion is
/// signaled through [`EngineEvent`]s. `dispose` is synchronous, must be
/// safe after a failed or never-started connect, and must leave
/// `is_connected` returning `false` without panicking.
pub trait DisplayEngine: Send {
    /// Issue the asynchronous connect request.
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Issue the asynchronous disconnect request. Best effort.
    fn disconnect(&mut self);

    /// Tear down engine resources. Best effort, never fails.
    fn dispose(&mut self);

    /// `true` only between `Connected` and the next disconnect or
    /// dispose.
    fn is_connected(&self) -> bool;
}

/// Builds configured engine instances for a controller.
pub trait EngineFactory: Send {
    /// Build an engine for `spec` that reports events tagged with
    /// `generation` through `events`.
    fn build(
        &mut self,
        spec: &EngineSpec,
        generation: EngineGeneration,
        events: EngineEventSender,
    ) -> Result<Box<dyn DisplayEngine>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    #[test]
    fn spec_carries_resolved_size() {
        let config = SessionConfig {
            address: "10.0.0.9".into(),
            port: 3390,
            username: "ops".into(),
            password: "secret".into(),
            full_screen: false,
            auto_fit: false,
            width: 1280,
            height: 720,
            color_depth: ColorDepth::Bpp24,
        };
        let spec = EngineSpec::from_config(&config, DesktopSize::new(1280, 720));
        assert_eq!(spec.address, "10.0.0.9");
        assert_eq!(spec.port, 3390);
        assert_eq!(spec.desktop, DesktopSize::new(1280, 720));
        assert_eq!(spec.color_depth.bits(), 24);
    }
}
