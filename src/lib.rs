//! streambridge
//!
//! A consumer-side adapter between an application's event-handling
//! logic and Kafka. The client manages the broker connection lifecycle,
//! subscribes to topics under a consumer-group identity, pulls messages
//! in a blocking loop, normalizes broker metadata into transport-neutral
//! envelopes, dispatches them to listeners, and exposes manual
//! commit/reject offset control for at-least-once delivery.
//!
//! Deserializing payload bytes into typed events, routing by event
//! type, and the producer path are deliberately left to the caller:
//! listeners receive only headers, raw bytes, the topic, and a receipt
//! for later acknowledgment.

pub mod consumer;
pub mod error;
pub mod logging;

// Re-export commonly used types at the crate root
pub use consumer::{
    BrokerAddress, Category, ConsumerClient, ConsumerConfig, HeaderEnricher, KafkaReceipt,
    MessageEnvelope, Notification, Receipt, GROUP_HEADER,
};
pub use error::{Error, Result};
