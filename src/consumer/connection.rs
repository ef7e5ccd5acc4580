//! Lazy, thread-safe management of the broker connection handle
//!
//! The handle is created exactly once on first use (subscribe or
//! listen) behind a double-checked lock: a read-lock fast path skips
//! the exclusive section once warm, and the re-check under the write
//! lock guards the race where two threads observe "absent"
//! simultaneously. Construction failure leaves the state absent so a
//! later call can retry; disposal is terminal.

use std::sync::{Arc, RwLock};

use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::{BaseConsumer, ConsumerContext};
use rdkafka::error::KafkaError;

use crate::error::{Error, Result};

use super::config::ConsumerConfig;
use super::{Category, Notifier};

/// Context installed on the broker handle
///
/// librdkafka invokes these hooks from its own background threads;
/// they forward client-internal log lines and errors into the
/// notification channel, so listeners must be reentrant-safe.
pub(crate) struct BridgeContext {
    notifier: Arc<Notifier>,
}

impl ClientContext for BridgeContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        tracing::debug!(level = ?level, facility = fac, "librdkafka: {}", log_message);
        self.notifier
            .log(Category::Broker, format!("{}: {}", fac, log_message));
    }

    fn error(&self, error: KafkaError, reason: &str) {
        self.notifier
            .error(Category::Broker, format!("{}: {}", error, reason));
    }
}

impl ConsumerContext for BridgeContext {}

/// The broker handle type used by the client
pub(crate) type BridgeConsumer = BaseConsumer<BridgeContext>;

enum ConnectionState {
    /// No handle yet; the next `ensure_connected` will construct one
    Idle,

    /// Live handle; never replaced for the lifetime of the client
    Connected(Arc<BridgeConsumer>),

    /// Terminal; every subsequent operation fails fast
    Disposed,
}

/// Owns the lazy, mutually-exclusive creation of the broker handle
pub(crate) struct ConnectionManager {
    config: ConsumerConfig,
    state: RwLock<ConnectionState>,
    notifier: Arc<Notifier>,
}

impl ConnectionManager {
    pub(crate) fn new(config: ConsumerConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            config,
            state: RwLock::new(ConnectionState::Idle),
            notifier,
        }
    }

    /// Return the live handle, creating it on first use
    ///
    /// Idempotent and thread-safe: concurrent callers observe the same
    /// handle, and exactly one of them constructs it.
    pub(crate) fn ensure_connected(&self) -> Result<Arc<BridgeConsumer>> {
        {
            let state = self.state.read().expect("connection state lock poisoned");
            match &*state {
                ConnectionState::Connected(consumer) => return Ok(Arc::clone(consumer)),
                ConnectionState::Disposed => return Err(Error::Disposed),
                ConnectionState::Idle => {}
            }
        }

        let mut state = self.state.write().expect("connection state lock poisoned");
        match &*state {
            // Lost the race; another thread connected first.
            ConnectionState::Connected(consumer) => Ok(Arc::clone(consumer)),
            ConnectionState::Disposed => Err(Error::Disposed),
            ConnectionState::Idle => {
                let consumer = self.create_consumer()?;
                let consumer = Arc::new(consumer);
                *state = ConnectionState::Connected(Arc::clone(&consumer));

                self.notifier.log(
                    Category::Connection,
                    format!(
                        "connected to {} as group '{}'",
                        self.config.broker_address(),
                        self.config.group_id
                    ),
                );
                Ok(consumer)
            }
        }
    }

    fn create_consumer(&self) -> Result<BridgeConsumer> {
        let context = BridgeContext {
            notifier: Arc::clone(&self.notifier),
        };

        self.config
            .build_client_config()
            .create_with_context(context)
            .map_err(|e| {
                let reason = format!("Failed to create Kafka consumer: {}", e);
                tracing::error!(
                    brokers = %self.config.brokers,
                    group_id = %self.config.group_id,
                    "{}", reason
                );
                self.notifier.error(Category::Connection, reason.clone());
                Error::connection(reason)
            })
    }

    /// True once a handle exists and the client is not disposed
    pub(crate) fn is_connected(&self) -> bool {
        matches!(
            &*self.state.read().expect("connection state lock poisoned"),
            ConnectionState::Connected(_)
        )
    }

    /// Release the handle; repeated calls are no-ops
    pub(crate) fn dispose(&self) {
        let mut state = self.state.write().expect("connection state lock poisoned");
        match &*state {
            ConnectionState::Disposed => {}
            ConnectionState::Idle => {
                *state = ConnectionState::Disposed;
            }
            ConnectionState::Connected(_) => {
                *state = ConnectionState::Disposed;
                self.notifier.log(
                    Category::Connection,
                    format!("disconnected from {}", self.config.broker_address()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn manager_with_log_counter() -> (Arc<ConnectionManager>, Arc<Mutex<Vec<String>>>) {
        let notifier = Arc::new(Notifier::new());
        let connects = Arc::new(Mutex::new(Vec::new()));

        {
            let connects = Arc::clone(&connects);
            notifier.logs.register(move |notification| {
                if notification.category == Category::Connection {
                    connects.lock().unwrap().push(notification.reason.clone());
                }
            });
        }

        let manager = Arc::new(ConnectionManager::new(ConsumerConfig::default(), notifier));
        (manager, connects)
    }

    #[test]
    fn test_connect_is_lazy() {
        let (manager, connects) = manager_with_log_counter();
        assert!(!manager.is_connected());
        assert!(connects.lock().unwrap().is_empty());
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (manager, connects) = manager_with_log_counter();

        manager.ensure_connected().unwrap();
        manager.ensure_connected().unwrap();

        assert!(manager.is_connected());
        assert_eq!(connects.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_connect_creates_one_handle() {
        let (manager, connects) = manager_with_log_counter();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.ensure_connected().map(|_| ()))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(connects.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let (manager, _) = manager_with_log_counter();
        manager.ensure_connected().unwrap();

        manager.dispose();
        manager.dispose();

        assert!(!manager.is_connected());
        assert!(matches!(manager.ensure_connected(), Err(Error::Disposed)));
    }

    #[test]
    fn test_dispose_before_connect_is_safe() {
        let (manager, connects) = manager_with_log_counter();
        manager.dispose();
        assert!(connects.lock().unwrap().is_empty());
        assert!(matches!(manager.ensure_connected(), Err(Error::Disposed)));
    }
}
