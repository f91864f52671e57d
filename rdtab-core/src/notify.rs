//! Deferred user-facing notifications.
//!
//! Engine callbacks are not reentrant-safe for synchronous UI calls:
//! presenting a dialog while the engine's callback stack is still
//! unwinding can deadlock the event thread. Every user-visible notice
//! therefore goes through [`DeferredNotifier`], which holds at most one
//! pending notice and presents it one short scheduler tick later — and
//! only if the viewport is still live at fire time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::trace;

/// How long a notice is deferred before presentation.
pub const NOTIFY_DELAY: Duration = Duration::from_millis(100);

// ── Notice ───────────────────────────────────────────────────────

/// One user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub title: String,
}

/// Presentation seam the UI collaborator implements (dialog, toast,
/// status line). Called off the engine callback stack.
pub trait NoticeSink: Send + Sync {
    fn present(&self, notice: &Notice);
}

// ── DeferredNotifier ─────────────────────────────────────────────

/// Defers notices by [`NOTIFY_DELAY`], keeping at most one pending.
///
/// A notice scheduled while another is still pending overwrites it;
/// only the newest ever fires. A notice whose viewport flag has been
/// cleared by fire time is silently dropped.
pub struct DeferredNotifier {
    pending: Arc<Mutex<Option<Notice>>>,
    /// Bumped on every schedule/cancel; a sleep task only fires if its
    /// stamp is still current when it wakes.
    generation: Arc<AtomicU64>,
    viewport_live: Arc<AtomicBool>,
    sink: Arc<dyn NoticeSink>,
}

impl DeferredNotifier {
    /// `viewport_live` is owned by the UI collaborator and cleared when
    /// the viewport container is torn down.
    pub fn new(viewport_live: Arc<AtomicBool>, sink: Arc<dyn NoticeSink>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            viewport_live,
            sink,
        }
    }

    /// Schedule a notice, overwriting any not-yet-fired one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, message: impl Into<String>, title: impl Into<String>) {
        let notice = Notice {
            message: message.into(),
            title: title.into(),
        };
        if !self.viewport_live.load(Ordering::SeqCst) {
            trace!("viewport gone, dropping notice: {}", notice.title);
            return;
        }

        *lock(&self.pending) = Some(notice);
        let stamp = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let pending = Arc::clone(&self.pending);
        let generation = Arc::clone(&self.generation);
        let viewport_live = Arc::clone(&self.viewport_live);
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(NOTIFY_DELAY).await;
            if generation.load(Ordering::SeqCst) != stamp {
                // Superseded by a newer notice or cancelled.
                return;
            }
            if !viewport_live.load(Ordering::SeqCst) {
                trace!("viewport torn down before notice fired; dropping");
                return;
            }
            if let Some(notice) = lock(&pending).take() {
                sink.present(&notice);
            }
        });
    }

    /// Drop the pending notice, if any, and invalidate its timer.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *lock(&self.pending) = None;
    }

    /// Whether a notice is waiting to fire.
    pub fn has_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSink {
        presented: Mutex<Vec<Notice>>,
        count: AtomicUsize,
    }

    impl NoticeSink for CountingSink {
        fn present(&self, notice: &Notice) {
            self.count.fetch_add(1, Ordering::SeqCst);
            lock(&self.presented).push(notice.clone());
        }
    }

    fn notifier() -> (DeferredNotifier, Arc<CountingSink>, Arc<AtomicBool>) {
        let sink = Arc::new(CountingSink::default());
        let live = Arc::new(AtomicBool::new(true));
        let notifier = DeferredNotifier::new(Arc::clone(&live), sink.clone());
        (notifier, sink, live)
    }

    #[tokio::test(start_paused = true)]
    async fn notice_fires_after_delay() {
        let (notifier, sink, _live) = notifier();
        notifier.schedule("session lost", "disconnected");
        assert!(notifier.has_pending());
        assert_eq!(sink.count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(NOTIFY_DELAY * 2).await;
        assert_eq!(sink.count.load(Ordering::SeqCst), 1);
        assert!(!notifier.has_pending());
        assert_eq!(lock(&sink.presented)[0].title, "disconnected");
    }

    #[tokio::test(start_paused = true)]
    async fn newer_notice_overwrites_pending() {
        let (notifier, sink, _live) = notifier();
        notifier.schedule("first", "a");
        tokio::time::sleep(Duration::from_millis(50)).await;
        notifier.schedule("second", "b");

        tokio::time::sleep(NOTIFY_DELAY * 2).await;
        assert_eq!(sink.count.load(Ordering::SeqCst), 1);
        assert_eq!(lock(&sink.presented)[0].message, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_when_viewport_torn_down() {
        let (notifier, sink, live) = notifier();
        notifier.schedule("too late", "gone");
        live.store(false, Ordering::SeqCst);

        tokio::time::sleep(NOTIFY_DELAY * 2).await;
        assert_eq!(sink.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending() {
        let (notifier, sink, _live) = notifier();
        notifier.schedule("never", "cancelled");
        notifier.cancel();
        assert!(!notifier.has_pending());

        tokio::time::sleep(NOTIFY_DELAY * 2).await;
        assert_eq!(sink.count.load(Ordering::SeqCst), 0);
    }
}
