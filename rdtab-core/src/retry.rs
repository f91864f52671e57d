//! Disconnect-reason classification and the bounded retry counter.
//!
//! The numeric reason codes are vendor-specific to the display-protocol
//! engine. The classification must stay total: every `u32` maps to
//! exactly one [`DisconnectClass`].

use std::time::Duration;

/// Maximum automatic reconnect attempts between successful connects.
pub const MAX_RETRIES: u32 = 3;

/// Fixed delay between a retryable disconnect and the next attempt.
pub const RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Reason code reported for a manual disconnect when the engine never
/// delivered one (user-initiated in the engine's reason table).
pub const MANUAL_DISCONNECT_REASON: u32 = 1;

// ── Classification ───────────────────────────────────────────────

/// What a disconnect reason code means for the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    /// User- or admin-initiated disconnect. Terminal, no notice.
    Normal,
    /// The session was taken over by another login (or the server
    /// kicked it). Terminal, surfaced once, never retried.
    Kicked,
    /// Anything else — assumed transient and eligible for retry.
    Retryable,
}

/// Classify an engine disconnect reason code.
///
/// Codes 1 and 2 are clean user/admin disconnects. Code 5 means the
/// session was replaced by another login; the same condition can also
/// arrive in the upper 16 "extended reason" bits. Code 3 is a
/// server-side kick. Every other code is treated as transient.
pub fn classify(reason: u32) -> DisconnectClass {
    let extended = (reason >> 16) & 0xFFFF;
    match reason {
        1 | 2 => DisconnectClass::Normal,
        3 | 5 => DisconnectClass::Kicked,
        _ if extended == 5 => DisconnectClass::Kicked,
        _ => DisconnectClass::Retryable,
    }
}

/// Whether a reason code is eligible for an automatic retry.
pub fn is_retryable(reason: u32) -> bool {
    classify(reason) == DisconnectClass::Retryable
}

// ── RetryCounter ─────────────────────────────────────────────────

/// Bounded attempt counter, reset on every successful connect.
#[derive(Debug, Clone)]
pub struct RetryCounter {
    attempts: u32,
    cap: u32,
}

impl Default for RetryCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryCounter {
    pub fn new() -> Self {
        Self::with_cap(MAX_RETRIES)
    }

    pub fn with_cap(cap: u32) -> Self {
        Self { attempts: 0, cap }
    }

    /// Consume one attempt. Returns `true` (and increments) while under
    /// the cap, `false` once exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.attempts < self.cap {
            self.attempts += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }
}
