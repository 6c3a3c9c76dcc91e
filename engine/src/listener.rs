//! Completion notifications.
//!
//! The engine holds its listener through a [`Weak`] handle so a run never
//! keeps its caller alive. Events for a listener that is already gone are
//! dropped.

use std::sync::{Arc, Weak};

use tracing::debug;

/// Receiver of the terminal outcome of a run, plus non-fatal warnings.
pub trait CompletionListener: Send + Sync {
    /// The run finished without a fatal error.
    ///
    /// `copy_only` is false for moves; `all_transferred` is false when some
    /// top-level source was left incomplete.
    fn on_copy_succeeded(&self, copy_only: bool, all_transferred: bool, destination: &str);

    /// A fatal error aborted the run.
    fn on_copy_failed(&self, message: &str);

    /// A soft error the run recovered from.
    fn on_warning(&self, _message: &str) {}
}

/// Weak handle on a listener, checked for liveness before every event.
#[derive(Clone)]
pub struct ListenerHandle {
    inner: Option<Weak<dyn CompletionListener>>,
}

impl ListenerHandle {
    pub fn new(listener: Weak<dyn CompletionListener>) -> Self {
        ListenerHandle {
            inner: Some(listener),
        }
    }

    /// Handle that is never alive.
    pub fn detached() -> Self {
        ListenerHandle { inner: None }
    }

    /// Downgrade a strong reference into a handle.
    pub fn from_arc(listener: &Arc<dyn CompletionListener>) -> Self {
        Self::new(Arc::downgrade(listener))
    }

    /// Run `event` against the listener if it is still alive.
    pub fn notify(&self, event: impl FnOnce(&dyn CompletionListener)) {
        match self.inner.as_ref().and_then(Weak::upgrade) {
            Some(listener) => event(listener.as_ref()),
            None => debug!("completion listener gone; dropping event"),
        }
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let alive = self.inner.as_ref().is_some_and(|w| w.strong_count() > 0);
        f.debug_struct("ListenerHandle").field("alive", &alive).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl CompletionListener for Recorder {
        fn on_copy_succeeded(&self, copy_only: bool, all_transferred: bool, destination: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ok({}, {}, {})", copy_only, all_transferred, destination));
        }

        fn on_copy_failed(&self, message: &str) {
            self.events.lock().unwrap().push(format!("failed({})", message));
        }
    }

    #[test]
    fn test_live_listener_receives_event() {
        let recorder = Arc::new(Recorder::default());
        let listener: Arc<dyn CompletionListener> = recorder.clone();
        let handle = ListenerHandle::from_arc(&listener);

        handle.notify(|l| l.on_copy_succeeded(true, true, "/dst"));
        assert_eq!(recorder.events.lock().unwrap().as_slice(), ["ok(true, true, /dst)"]);
    }

    #[test]
    fn test_stale_listener_drops_event() {
        let listener: Arc<dyn CompletionListener> = Arc::new(Recorder::default());
        let handle = ListenerHandle::from_arc(&listener);
        drop(listener);

        let mut called = false;
        handle.notify(|_| called = true);
        assert!(!called);

        ListenerHandle::detached().notify(|_| called = true);
        assert!(!called);
    }
}
