//! Observer registration lists for the consumer's notification channels
//!
//! The client owns three independent listener lists: message-received,
//! operational log and error log. Dispatch is synchronous and follows
//! registration order. Listeners may be invoked from librdkafka's own
//! background threads, so callbacks must be `Send + Sync` and emission
//! snapshots the list before invoking, keeping re-registration from a
//! listener safe.

use std::sync::{Arc, Mutex};

use super::{Category, MessageEnvelope, Notification};

/// Ordered list of callbacks for one notification stream
pub(crate) struct Listeners<T> {
    callbacks: Mutex<Vec<Arc<dyn Fn(&T) + Send + Sync>>>,
}

impl<T> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Append a callback; dispatch preserves registration order
    pub(crate) fn register<F>(&self, callback: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.callbacks
            .lock()
            .expect("listener list lock poisoned")
            .push(Arc::new(callback));
    }

    /// Invoke every registered callback synchronously, in order
    pub(crate) fn emit(&self, event: &T) {
        // Snapshot outside the lock so a callback may register listeners.
        let snapshot: Vec<_> = self
            .callbacks
            .lock()
            .expect("listener list lock poisoned")
            .clone();

        for callback in snapshot {
            callback(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().expect("listener list lock poisoned").len()
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The client's three notification streams
pub(crate) struct Notifier {
    pub(crate) messages: Listeners<MessageEnvelope>,
    pub(crate) logs: Listeners<Notification>,
    pub(crate) errors: Listeners<Notification>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self {
            messages: Listeners::new(),
            logs: Listeners::new(),
            errors: Listeners::new(),
        }
    }

    /// Emit an operational log notification
    pub(crate) fn log(&self, category: Category, reason: impl Into<String>) {
        let notification = Notification::new(category, reason);
        tracing::debug!(
            category = ?notification.category,
            reason = %notification.reason,
            "Log notification"
        );
        self.logs.emit(&notification);
    }

    /// Emit an error notification
    pub(crate) fn error(&self, category: Category, reason: impl Into<String>) {
        let notification = Notification::new(category, reason);
        tracing::error!(
            category = ?notification.category,
            reason = %notification.reason,
            "Error notification"
        );
        self.errors.emit(&notification);
    }
}
