//! Domain-specific error types for the session lifecycle core.
//!
//! All fallible operations return `Result<T, SessionError>`.
//! No panics on invalid input — every error is typed and recoverable.
//! Engine teardown is the one place errors are swallowed: dispose is
//! best effort and must never keep a controller from reaching `Closed`.

use thiserror::Error;

/// The canonical error type for the session lifecycle core.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Configuration Errors ─────────────────────────────────────
    /// A field in the session configuration failed validation.
    #[error("invalid session config: {0}")]
    InvalidConfig(&'static str),

    // ── Engine Errors ────────────────────────────────────────────
    /// The engine factory failed to build a configured instance.
    #[error("engine setup failed: {0}")]
    EngineSetup(String),

    /// The engine rejected a request (connect, disconnect).
    #[error("engine error: {0}")]
    Engine(String),

    // ── Controller Errors ────────────────────────────────────────
    /// A resolution change is already in flight.
    #[error("resolution change already in progress")]
    Busy,

    /// The controller task has ended; the handle is stale.
    #[error("session controller is gone")]
    ControllerGone,
}

impl From<String> for SessionError {
    fn from(s: String) -> Self {
        SessionError::Engine(s)
    }
}

impl From<&str> for SessionError {
    fn from(s: &str) -> Self {
        SessionError::Engine(s.to_string())
    }
}
