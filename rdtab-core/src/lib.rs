//! # rdtab-core
//!
//! Remote-session lifecycle core for the rdtab connection manager.
//!
//! This crate contains:
//! - **Controller**: `SessionController` — the per-tab state machine that
//!   owns one display-engine instance, drives connect/retry/teardown, and
//!   raises lifecycle events
//! - **Engine contract**: `DisplayEngine`/`EngineFactory` — the opaque
//!   display-protocol collaborator, replaced wholesale on retry and
//!   resolution change
//! - **Retry**: total disconnect-reason classification and the bounded
//!   attempt counter
//! - **Resolution**: desktop-size selection, clamping, and the
//!   teardown-and-rebuild resolution change
//! - **Notify**: `DeferredNotifier` — user-facing notices deferred off the
//!   engine callback stack
//! - **Error**: `SessionError` — typed, `thiserror`-based error hierarchy
//!
//! Rendering, input redirection, the wire protocol, persistence, and all
//! tree/tab UI behavior live outside this crate.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod notify;
pub mod resolution;
pub mod retry;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use config::{ColorDepth, SessionConfig};
pub use controller::{
    SETTLE_DELAY, SessionController, SessionEvent, SessionHandle, SessionState,
};
pub use engine::{
    DisplayEngine, EngineEvent, EngineEventSender, EngineFactory, EngineGeneration, EngineSpec,
};
pub use error::SessionError;
pub use notify::{DeferredNotifier, NOTIFY_DELAY, Notice, NoticeSink};
pub use resolution::{
    DEFAULT_DESKTOP, DesktopSize, DisplayMetrics, MAX_DESKTOP, MIN_DESKTOP, select_desktop_size,
};
pub use retry::{
    DisconnectClass, MANUAL_DISCONNECT_REASON, MAX_RETRIES, RETRY_DELAY, RetryCounter, classify,
    is_retryable,
};
