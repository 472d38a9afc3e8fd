//! Synchronous observer broadcast.

use super::{DuplicatePair, Event};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

/// Receives every event a finder emits.
///
/// Called on worker threads, possibly several at once, so implementations
/// must be cheap and thread-safe.
pub trait EventListener: Send + Sync {
    fn notify(&self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        self(event)
    }
}

/// Broadcasts events to listeners in registration order.
///
/// A panicking listener is logged and skipped; the rest still hear the
/// event and later events are delivered as usual.
#[derive(Default)]
pub struct EventNotifier {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn broadcast(&self, event: &Event) {
        // Snapshot so a listener may subscribe others without deadlocking
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (position, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener.notify(event))).is_err() {
                warn!(listener = position, ?event, "Event listener panicked");
            }
        }
    }

    pub fn progress(&self, percent: f64) {
        self.broadcast(&Event::Progress { percent });
    }

    pub fn duplicate_found(&self, pair: DuplicatePair) {
        self.broadcast(&Event::DuplicateFound(pair));
    }

    pub fn processing_complete(&self, cancelled: bool) {
        self.broadcast(&Event::ProcessingComplete { cancelled });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn EventListener> {
        let log = Arc::clone(log);
        Arc::new(move |event: &Event| {
            log.lock().unwrap().push(format!("{}:{:?}", name, event));
        })
    }

    #[test]
    fn broadcast_reaches_listeners_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier = EventNotifier::new();
        notifier.subscribe(recorder(&log, "first"));
        notifier.subscribe(recorder(&log, "second"));

        notifier.processing_complete(false);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].starts_with("first:"));
        assert!(log[1].starts_with("second:"));
    }

    #[test]
    fn panicking_listener_does_not_stop_broadcast() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let notifier = EventNotifier::new();
        notifier.subscribe(Arc::new(|_: &Event| {
            panic!("listener failure");
        }));
        notifier.subscribe(recorder(&log, "survivor"));

        notifier.progress(50.0);
        notifier.progress(100.0);

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn broadcast_without_listeners_is_fine() {
        let notifier = EventNotifier::new();
        notifier.duplicate_found(DuplicatePair::new("/b.png".into(), "/a.png".into(), 1));
        assert_eq!(notifier.listener_count(), 0);
    }
}
