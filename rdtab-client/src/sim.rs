//! Simulated display engine.
//!
//! Stands in for a real display-protocol client so the host binary can
//! exercise the whole session lifecycle offline. Each instance drives a
//! small scripted timeline on a spawned task: connect after a short
//! delay, report login, and optionally drop the link once mid-session
//! so the controller's retry path is visible in the logs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use rdtab_core::{
    DisplayEngine, EngineEvent, EngineEventSender, EngineFactory, EngineGeneration, EngineSpec,
    MANUAL_DISCONNECT_REASON, SessionError,
};

// ── Configuration ────────────────────────────────────────────────

/// Scripted behavior for the simulated engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Milliseconds from connect request to `Connected`.
    pub connect_delay_ms: u64,
    /// Milliseconds from `Connected` to `LoginComplete`.
    pub login_delay_ms: u64,
    /// If set, the first engine instance drops the link this many
    /// milliseconds after login. Later instances stay up, so the run
    /// shows one transport drop followed by a successful retry.
    pub drop_after_ms: Option<u64>,
    /// Vendor reason code reported for the scripted drop.
    pub drop_reason: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            connect_delay_ms: 150,
            login_delay_ms: 100,
            drop_after_ms: Some(2000),
            drop_reason: 2308,
        }
    }
}

// ── SimEngine ────────────────────────────────────────────────────

/// One simulated connection instance.
pub struct SimEngine {
    spec: EngineSpec,
    settings: SimulatorConfig,
    generation: EngineGeneration,
    events: EngineEventSender,
    connected: Arc<AtomicBool>,
    /// Set once across all instances from one factory; gates the
    /// scripted drop so only the first connection suffers it.
    dropped_once: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl DisplayEngine for SimEngine {
    fn connect(&mut self) -> Result<(), SessionError> {
        let spec = self.spec.clone();
        let settings = self.settings.clone();
        let generation = self.generation;
        let events = self.events.clone();
        let connected = Arc::clone(&self.connected);
        let dropped_once = Arc::clone(&self.dropped_once);

        self.driver = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(settings.connect_delay_ms)).await;
            debug!(
                generation,
                "sim engine up: {}:{} at {}", spec.address, spec.port, spec.desktop
            );
            connected.store(true, Ordering::SeqCst);
            let _ = events.send((generation, EngineEvent::Connected));

            tokio::time::sleep(Duration::from_millis(settings.login_delay_ms)).await;
            let _ = events.send((generation, EngineEvent::LoginComplete));

            let Some(drop_after) = settings.drop_after_ms else {
                return;
            };
            tokio::time::sleep(Duration::from_millis(drop_after)).await;
            if dropped_once.swap(true, Ordering::SeqCst) {
                return;
            }
            if connected.swap(false, Ordering::SeqCst) {
                debug!(generation, "sim engine dropping link");
                let _ = events.send((
                    generation,
                    EngineEvent::Disconnected {
                        reason: settings.drop_reason,
                    },
                ));
            }
        }));
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send((
                self.generation,
                EngineEvent::Disconnected {
                    reason: MANUAL_DISCONNECT_REASON,
                },
            ));
        }
    }

    fn dispose(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SimEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ── SimEngineFactory ─────────────────────────────────────────────

/// Builds [`SimEngine`] instances sharing one drop-once latch.
pub struct SimEngineFactory {
    settings: SimulatorConfig,
    dropped_once: Arc<AtomicBool>,
}

impl SimEngineFactory {
    pub fn new(settings: SimulatorConfig) -> Self {
        Self {
            settings,
            dropped_once: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl EngineFactory for SimEngineFactory {
    fn build(
        &mut self,
        spec: &EngineSpec,
        generation: EngineGeneration,
        events: EngineEventSender,
    ) -> Result<Box<dyn DisplayEngine>, SessionError> {
        Ok(Box::new(SimEngine {
            spec: spec.clone(),
            settings: self.settings.clone(),
            generation,
            events,
            connected: Arc::new(AtomicBool::new(false)),
            dropped_once: Arc::clone(&self.dropped_once),
            driver: None,
        }))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rdtab_core::{ColorDepth, DesktopSize};
    use tokio::sync::mpsc;

    fn spec() -> EngineSpec {
        EngineSpec {
            address: "10.0.0.5".into(),
            port: 3389,
            username: "ops".into(),
            password: String::new(),
            desktop: DesktopSize::new(1280, 720),
            color_depth: ColorDepth::Bpp32,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_timeline_connects_then_drops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut factory = SimEngineFactory::new(SimulatorConfig::default());
        let mut engine = factory.build(&spec(), 1, tx).unwrap();
        engine.connect().unwrap();

        assert_eq!(rx.recv().await, Some((1, EngineEvent::Connected)));
        assert!(engine.is_connected());
        assert_eq!(rx.recv().await, Some((1, EngineEvent::LoginComplete)));
        assert_eq!(
            rx.recv().await,
            Some((1, EngineEvent::Disconnected { reason: 2308 }))
        );
        assert!(!engine.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn second_instance_stays_up() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut factory = SimEngineFactory::new(SimulatorConfig {
            drop_after_ms: Some(100),
            ..SimulatorConfig::default()
        });

        let mut first = factory.build(&spec(), 1, tx.clone()).unwrap();
        first.connect().unwrap();
        while rx.recv().await != Some((1, EngineEvent::Disconnected { reason: 2308 })) {}
        first.dispose();

        let mut second = factory.build(&spec(), 2, tx).unwrap();
        second.connect().unwrap();
        assert_eq!(rx.recv().await, Some((2, EngineEvent::Connected)));
        assert_eq!(rx.recv().await, Some((2, EngineEvent::LoginComplete)));

        // The drop-once latch is already set; give the scripted drop
        // window plenty of time to (not) fire.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(second.is_connected());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_disconnect_reports_reason_one() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut factory = SimEngineFactory::new(SimulatorConfig {
            drop_after_ms: None,
            ..SimulatorConfig::default()
        });
        let mut engine = factory.build(&spec(), 7, tx).unwrap();
        engine.connect().unwrap();
        assert_eq!(rx.recv().await, Some((7, EngineEvent::Connected)));
        assert_eq!(rx.recv().await, Some((7, EngineEvent::LoginComplete)));

        engine.disconnect();
        assert_eq!(
            rx.recv().await,
            Some((7, EngineEvent::Disconnected { reason: 1 }))
        );
        // Idempotent once down.
        engine.disconnect();
        assert!(rx.try_recv().is_err());
    }
}
