//! Kafka consumer client module
//!
//! This module provides:
//! - Lazy, thread-safe management of the broker connection handle
//! - A blocking consume loop with cooperative cancellation
//! - Normalization of broker metadata into transport-neutral envelopes
//! - Manual offset control (commit and reject/reassign)
//! - Synchronous notification channels for messages, logs and errors

mod client;
mod config;
mod connection;
mod envelope;
mod listeners;

pub use client::ConsumerClient;
pub use config::{BrokerAddress, ConsumerConfig};
pub use envelope::{HeaderEnricher, KafkaReceipt, MessageEnvelope, Receipt, GROUP_HEADER};

pub(crate) use connection::ConnectionManager;
pub(crate) use listeners::Notifier;

/// Category of a log or error notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Connection handle lifecycle (creation, disposal)
    Connection,

    /// Topic subscription changes
    Subscription,

    /// Conditions observed inside the consume loop
    Consume,

    /// Offset control operations (commit, reject)
    Offset,

    /// Asynchronous conditions reported by the underlying client
    Broker,
}

/// Ephemeral log or error notification
///
/// Fire-and-forget; delivered synchronously to registered listeners
/// with no buffering or replay.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Enumerated kind of the condition
    pub category: Category,

    /// Human-readable reason
    pub reason: String,
}

impl Notification {
    pub(crate) fn new(category: Category, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}
