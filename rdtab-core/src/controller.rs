//! The remote-session lifecycle controller.
//!
//! One [`SessionController`] owns one live display-engine instance and
//! drives it through the session state machine:
//!
//! ```text
//!  Idle ──► Connecting ──► Connected ──► Disconnecting ──► Closed
//!              │ ▲             │                             ▲
//!              ▼ └─────────────┤ (retryable disconnect)      │
//!            Retrying ─────────┘────────────────────────────►┘
//! ```
//!
//! The controller runs as a single event loop: public calls arrive as
//! messages through a [`SessionHandle`], engine notifications arrive on
//! the engine event channel, and the fixed delays (retry, settle,
//! notify) are scheduled continuations that post back into the same
//! loop with a generation stamp. Cancellation is a stamp bump; a stale
//! fire is a no-op. No locking — the loop is the only writer of the
//! session state.
//!
//! Resolution changes are a restart in disguise: the engine cannot
//! resize its virtual desktop live, so the controller disconnects,
//! waits out a short settle delay before touching the handle, disposes
//! the old instance, and builds a new one at the new size. At most one
//! engine instance is ever live per controller.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::engine::{
    DisplayEngine, EngineEvent, EngineEventSender, EngineFactory, EngineGeneration, EngineSpec,
};
use crate::error::SessionError;
use crate::notify::{DeferredNotifier, NoticeSink};
use crate::resolution::{self, DesktopSize, DisplayMetrics};
use crate::retry::{self, DisconnectClass, MANUAL_DISCONNECT_REASON, RETRY_DELAY, RetryCounter};

/// Wait after requesting a teardown disconnect before disposing the
/// engine, so its own async shutdown is not raced.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

const KICKED_NOTICE: &str = "Your remote desktop session was signed in from another location.\n\nThe connection has been closed.";
const KICKED_TITLE: &str = "disconnected";

// ── SessionState ─────────────────────────────────────────────────

/// The current phase of a remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Constructed, not yet connected. Initial state.
    #[default]
    Idle,
    /// Engine built, connect request issued.
    Connecting,
    /// The remote desktop is live.
    Connected,
    /// Waiting out the delay before an automatic reconnect attempt.
    Retrying,
    /// Teardown in progress (manual disconnect or resolution rebuild).
    Disconnecting,
    /// Terminal. The engine is disposed and stays disposed.
    Closed,
}

impl SessionState {
    /// `true` only while the remote desktop is live.
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// `true` once the session can never connect again.
    pub fn is_closed(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Retrying => write!(f, "Retrying"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ── SessionEvent ─────────────────────────────────────────────────

/// Lifecycle notifications raised to the UI collaborator.
///
/// Terminal paths always order events `StatusChanged*` →
/// `Disconnected` → `ConnectionClosed`. Fatal engine errors skip
/// `Disconnected` (there is no reason code on that channel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Human-readable status for the tab label / status bar.
    StatusChanged(String),
    /// Reassert input focus onto the engine viewport. Idempotent;
    /// emitted after every successful connect.
    FocusRequested,
    /// The session ended, with the engine's reason code (or the
    /// synthetic manual code).
    Disconnected { reason: u32 },
    /// The controller reached `Closed`; the owning tab can go away.
    ConnectionClosed,
}

// ── Messages ─────────────────────────────────────────────────────

type Reply = oneshot::Sender<Result<bool, SessionError>>;

enum Msg {
    Connect,
    Disconnect,
    ChangeResolution { width: u32, height: u32, reply: Reply },
    FitToWindow { reply: Reply },
    RetryElapsed { stamp: u64 },
    SettleElapsed { stamp: u64 },
}

struct PendingRebuild {
    desktop: DesktopSize,
    reply: Reply,
}

// ── SessionHandle ────────────────────────────────────────────────

/// Cloneable public surface of a running controller.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Msg>,
    state_rx: watch::Receiver<SessionState>,
    viewport_live: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Start the connect sequence. Ignored unless the session is idle.
    /// Engine build failures fail silently into `Closed` with a
    /// `ConnectionClosed` event.
    pub fn connect(&self) {
        let _ = self.tx.send(Msg::Connect);
    }

    /// Disconnect and close. Idempotent; a no-op from `Idle` or
    /// `Closed`, and cancels any pending retry.
    pub fn disconnect(&self) {
        let _ = self.tx.send(Msg::Disconnect);
    }

    /// Rebuild the session at a new desktop size.
    ///
    /// Returns `Ok(false)` when the session is not currently connected,
    /// `Ok(true)` once the replacement connect has been issued (it does
    /// not wait for that connect to succeed), and
    /// [`SessionError::Busy`] if another change is still in flight.
    pub async fn change_resolution(
        &self,
        width: u32,
        height: u32,
    ) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Msg::ChangeResolution {
                width,
                height,
                reply,
            })
            .map_err(|_| SessionError::ControllerGone)?;
        rx.await.map_err(|_| SessionError::ControllerGone)?
    }

    /// Rebuild the session at the viewport's size. `Ok(false)` when the
    /// viewport size is unknown or the session is not connected.
    pub async fn fit_to_window(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Msg::FitToWindow { reply })
            .map_err(|_| SessionError::ControllerGone)?;
        rx.await.map_err(|_| SessionError::ControllerGone)?
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Whether the remote desktop is currently live. Never fails.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Liveness flag for the viewport container. The UI collaborator
    /// clears it when the container is torn down; deferred notices and
    /// engine attach checks consult it.
    pub fn viewport_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.viewport_live)
    }

    /// Await a state change and return the new state. `None` once the
    /// controller is gone.
    pub async fn state_changed(&mut self) -> Option<SessionState> {
        self.state_rx.changed().await.ok()?;
        Some(*self.state_rx.borrow())
    }
}

// ── SessionController ────────────────────────────────────────────

/// Owns one engine instance at a time and drives the state machine.
///
/// Built with [`new`](Self::new), then consumed by [`run`](Self::run)
/// on the tokio runtime; all interaction goes through the returned
/// [`SessionHandle`] and the [`SessionEvent`] receiver.
pub struct SessionController {
    config: SessionConfig,
    metrics: DisplayMetrics,
    factory: Box<dyn EngineFactory>,

    engine: Option<Box<dyn DisplayEngine>>,
    engine_generation: EngineGeneration,

    state: SessionState,
    state_tx: watch::Sender<SessionState>,

    retries: RetryCounter,
    retry_armed: bool,
    retry_stamp: u64,

    rebuild: Option<PendingRebuild>,
    settle_stamp: u64,

    /// One-way latch: set by the first explicit disconnect, never
    /// cleared. No retry is scheduled once set.
    manual_disconnect: bool,
    last_reason: Option<u32>,

    notifier: DeferredNotifier,
    viewport_live: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SessionEvent>,

    /// Weak so the loop ends once every handle is dropped; a pending
    /// timer continuation holds a strong clone until it fires.
    msg_tx: mpsc::WeakUnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    engine_tx: EngineEventSender,
    engine_rx: mpsc::UnboundedReceiver<(EngineGeneration, EngineEvent)>,
}

impl SessionController {
    /// Build a controller for one logical tab.
    ///
    /// Validates the config synchronously; a bad address or port never
    /// crosses the event boundary. Returns the controller (to be run),
    /// its handle, and the lifecycle event receiver.
    pub fn new(
        config: SessionConfig,
        metrics: DisplayMetrics,
        factory: Box<dyn EngineFactory>,
        sink: Arc<dyn NoticeSink>,
    ) -> Result<
        (
            SessionController,
            SessionHandle,
            mpsc::UnboundedReceiver<SessionEvent>,
        ),
        SessionError,
    > {
        config.validate()?;

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let viewport_live = Arc::new(AtomicBool::new(true));

        let handle = SessionHandle {
            tx: msg_tx.clone(),
            state_rx,
            viewport_live: Arc::clone(&viewport_live),
        };
        let controller = SessionController {
            config,
            metrics,
            factory,
            engine: None,
            engine_generation: 0,
            state: SessionState::Idle,
            state_tx,
            retries: RetryCounter::new(),
            retry_armed: false,
            retry_stamp: 0,
            rebuild: None,
            settle_stamp: 0,
            manual_disconnect: false,
            last_reason: None,
            notifier: DeferredNotifier::new(Arc::clone(&viewport_live), sink),
            viewport_live,
            events: events_tx,
            msg_tx: msg_tx.downgrade(),
            msg_rx,
            engine_tx,
            engine_rx,
        };
        Ok((controller, handle, events_rx))
    }

    /// Run the controller event loop until every handle is dropped.
    ///
    /// Intended to be spawned on the tokio runtime; all engine
    /// notifications and timer fires are processed here, one at a time.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                maybe = self.msg_rx.recv() => match maybe {
                    Some(msg) => self.on_msg(msg),
                    None => break,
                },
                Some((generation, event)) = self.engine_rx.recv() => {
                    self.on_engine_event(generation, event);
                }
            }
        }
        // The owner dropped the handle; no engine may outlive us.
        self.notifier.cancel();
        self.teardown_engine();
    }

    fn on_msg(&mut self, msg: Msg) {
        match msg {
            Msg::Connect => self.on_connect_request(),
            Msg::Disconnect => self.on_disconnect_request(),
            Msg::ChangeResolution {
                width,
                height,
                reply,
            } => self.on_change_resolution(width, height, reply),
            Msg::FitToWindow { reply } => self.on_fit_to_window(reply),
            Msg::RetryElapsed { stamp } => self.on_retry_elapsed(stamp),
            Msg::SettleElapsed { stamp } => self.on_settle_elapsed(stamp),
        }
    }

    // ── Public command handlers ──────────────────────────────────

    fn on_connect_request(&mut self) {
        if self.state != SessionState::Idle {
            warn!(state = %self.state, "connect ignored: session already started");
            return;
        }
        let _ = self.start_connect();
    }

    fn on_disconnect_request(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return;
        }
        self.manual_disconnect = true;
        self.cancel_retry();

        // A mid-flight resolution rebuild loses the race: invalidate
        // its settle continuation and report the change as not applied.
        self.cancel_rebuild();

        self.set_state(SessionState::Disconnecting);
        if let Some(engine) = self.engine.as_mut() {
            if engine.is_connected() {
                engine.disconnect();
            }
        }
        self.teardown_engine();

        let reason = self.last_reason.unwrap_or(MANUAL_DISCONNECT_REASON);
        let _ = self.events.send(SessionEvent::Disconnected { reason });
        self.close();
    }

    fn on_change_resolution(&mut self, width: u32, height: u32, reply: Reply) {
        if self.rebuild.is_some() {
            let _ = reply.send(Err(SessionError::Busy));
            return;
        }
        if self.state != SessionState::Connected {
            let _ = reply.send(Ok(false));
            return;
        }

        self.emit_status("adjusting resolution");
        let desktop = DesktopSize::new(width, height).normalized();
        if let Some(engine) = self.engine.as_mut() {
            engine.disconnect();
        }
        self.set_state(SessionState::Disconnecting);
        self.rebuild = Some(PendingRebuild { desktop, reply });

        // Do not touch the engine until its async teardown has had
        // time to settle.
        self.settle_stamp += 1;
        let stamp = self.settle_stamp;
        let Some(tx) = self.msg_tx.upgrade() else {
            // Every handle is gone; the loop is about to end anyway.
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            let _ = tx.send(Msg::SettleElapsed { stamp });
        });
    }

    fn on_fit_to_window(&mut self, reply: Reply) {
        match self
            .metrics
            .viewport
            .filter(|v| v.width > 0 && v.height > 0)
        {
            Some(v) => self.on_change_resolution(v.width, v.height, reply),
            None => {
                let _ = reply.send(Ok(false));
            }
        }
    }

    // ── Timer continuations ──────────────────────────────────────

    fn on_retry_elapsed(&mut self, stamp: u64) {
        if stamp != self.retry_stamp || !self.retry_armed {
            trace!("stale retry timer fire; ignoring");
            return;
        }
        self.retry_armed = false;
        if self.manual_disconnect {
            return;
        }
        self.emit_status(format!(
            "retrying connection ({}/{})",
            self.retries.attempts(),
            self.retries.cap()
        ));
        self.teardown_engine();
        let _ = self.start_connect();
    }

    fn on_settle_elapsed(&mut self, stamp: u64) {
        if stamp != self.settle_stamp {
            return;
        }
        let Some(rebuild) = self.rebuild.take() else {
            return;
        };
        // Old instance fully disposed before the new one is built;
        // construction and destruction never interleave.
        self.teardown_engine();
        let result = self.build_and_connect(rebuild.desktop).map(|()| true);
        let _ = rebuild.reply.send(result);
    }

    // ── Engine notifications ─────────────────────────────────────

    fn on_engine_event(&mut self, generation: EngineGeneration, event: EngineEvent) {
        if generation != self.engine_generation || self.engine.is_none() {
            trace!(generation, ?event, "event from retired engine instance");
            return;
        }
        match event {
            EngineEvent::Connected => self.on_connected(),
            EngineEvent::LoginComplete => self.on_login_complete(),
            EngineEvent::Disconnected { reason } => self.on_disconnected(reason),
            EngineEvent::FatalError { code } => self.on_fatal_error(code),
        }
    }

    fn on_connected(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.retries.reset();
        self.retry_armed = false;
        // The session recovered; a later manual disconnect must report
        // the synthetic manual code, not this attempt's trigger.
        self.last_reason = None;
        self.set_state(SessionState::Connected);
        self.emit_status("connected");
        let _ = self.events.send(SessionEvent::FocusRequested);
    }

    fn on_login_complete(&mut self) {
        // Status only; never a state transition.
        if matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            self.emit_status("login complete");
        }
    }

    fn on_disconnected(&mut self, reason: u32) {
        if self.rebuild.is_some() {
            // Expected teardown disconnect of a resolution rebuild; the
            // settle continuation drives the rest.
            trace!(reason, "teardown disconnect during rebuild");
            return;
        }
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            trace!(reason, state = %self.state, "disconnect in inactive state");
            return;
        }
        self.last_reason = Some(reason);

        if self.manual_disconnect {
            let _ = self.events.send(SessionEvent::Disconnected { reason });
            self.close();
            return;
        }

        match retry::classify(reason) {
            DisconnectClass::Kicked => {
                self.emit_status("session replaced by another login");
                self.notifier.schedule(KICKED_NOTICE, KICKED_TITLE);
                let _ = self.events.send(SessionEvent::Disconnected { reason });
                self.close();
            }
            DisconnectClass::Normal => {
                let _ = self.events.send(SessionEvent::Disconnected { reason });
                self.close();
            }
            DisconnectClass::Retryable => {
                if self.retries.try_consume() {
                    self.schedule_retry();
                } else {
                    debug!(reason, "retry attempts exhausted");
                    let _ = self.events.send(SessionEvent::Disconnected { reason });
                    self.close();
                }
            }
        }
    }

    fn on_fatal_error(&mut self, code: u32) {
        warn!(code, "fatal engine error");
        self.notifier
            .schedule(format!("A fatal engine error occurred (code {code})."), "error");
        self.close();
    }

    // ── Internals ────────────────────────────────────────────────

    fn start_connect(&mut self) -> Result<(), SessionError> {
        let desktop = resolution::select_desktop_size(&self.config, &self.metrics);
        self.build_and_connect(desktop)
    }

    /// Build a fresh engine at `desktop` and issue its connect request.
    /// On failure the session fails silently into `Closed` (the error
    /// is also returned for callers that report it).
    fn build_and_connect(&mut self, desktop: DesktopSize) -> Result<(), SessionError> {
        debug_assert!(self.engine.is_none());
        let spec = EngineSpec::from_config(&self.config, desktop);
        self.engine_generation += 1;
        self.set_state(SessionState::Connecting);
        self.emit_status("connecting");
        debug!(
            address = %spec.address,
            port = spec.port,
            desktop = %spec.desktop,
            generation = self.engine_generation,
            "building engine"
        );

        match self
            .factory
            .build(&spec, self.engine_generation, self.engine_tx.clone())
        {
            Ok(mut engine) => match engine.connect() {
                Ok(()) => {
                    self.engine = Some(engine);
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "engine rejected connect; closing session");
                    engine.dispose();
                    self.close();
                    Err(e)
                }
            },
            Err(e) => {
                warn!(error = %e, "engine build failed; closing session");
                self.close();
                Err(e)
            }
        }
    }

    fn schedule_retry(&mut self) {
        let attempt = self.retries.attempts();
        let cap = self.retries.cap();
        self.set_state(SessionState::Retrying);
        self.emit_status(format!(
            "connection lost, retry {attempt}/{cap} in {}s",
            RETRY_DELAY.as_secs()
        ));

        self.retry_armed = true;
        self.retry_stamp += 1;
        let stamp = self.retry_stamp;
        let Some(tx) = self.msg_tx.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(RETRY_DELAY).await;
            let _ = tx.send(Msg::RetryElapsed { stamp });
        });
    }

    fn cancel_retry(&mut self) {
        self.retry_armed = false;
        self.retry_stamp += 1;
    }

    /// Invalidate a rebuild still waiting out its settle delay and tell
    /// its caller the change was not applied.
    fn cancel_rebuild(&mut self) {
        if let Some(rebuild) = self.rebuild.take() {
            self.settle_stamp += 1;
            let _ = rebuild.reply.send(Ok(false));
        }
    }

    /// Reach `Closed`: cancel timers and any pending rebuild, dispose
    /// the engine, raise `ConnectionClosed`. `Closed` is terminal — no
    /// continuation may build an engine past this point. Teardown is
    /// best effort by contract.
    fn close(&mut self) {
        self.cancel_retry();
        self.cancel_rebuild();
        self.teardown_engine();
        self.set_state(SessionState::Closed);
        let _ = self.events.send(SessionEvent::ConnectionClosed);
    }

    fn teardown_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state");
            self.state = next;
            self.state_tx.send_replace(next);
        }
    }

    fn emit_status(&self, status: impl Into<String>) {
        let status = status.into();
        debug!(%status);
        let _ = self.events.send(SessionEvent::StatusChanged(status));
    }

    /// Viewport liveness flag, shared with the deferred notifier and
    /// the handle. Cleared by the UI collaborator on container
    /// teardown.
    pub fn viewport_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.viewport_live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Idle.to_string(), "Idle");
        assert_eq!(SessionState::Connecting.to_string(), "Connecting");
        assert_eq!(SessionState::Connected.to_string(), "Connected");
        assert_eq!(SessionState::Retrying.to_string(), "Retrying");
        assert_eq!(SessionState::Disconnecting.to_string(), "Disconnecting");
        assert_eq!(SessionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn state_predicates() {
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Retrying.is_connected());
        assert!(SessionState::Closed.is_closed());
        assert!(!SessionState::Idle.is_closed());
        assert_eq!(SessionState::default(), SessionState::Idle);
    }
}
