//! Consumer client: subscribe, listen, commit, reject, dispose
//!
//! One client owns one lazily created broker handle and runs a single
//! blocking consume loop. Listeners receive envelopes synchronously on
//! the loop's thread, in registration order; offset control is manual,
//! giving at-least-once delivery.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{CommitMode, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::{Offset, TopicPartitionList};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::config::ConsumerConfig;
use super::envelope::{HeaderEnricher, MessageEnvelope, Receipt};
use super::{Category, ConnectionManager, Notification, Notifier};

/// Consumer client bridging a Kafka consumer group to envelope listeners
pub struct ConsumerClient {
    /// Consumer group identity, injected into every envelope's headers
    group_id: String,

    /// Upper bound on one blocking pull
    poll_timeout: Duration,

    /// Lazily created broker handle
    connection: ConnectionManager,

    /// Message, log and error listener lists
    notifier: Arc<Notifier>,

    /// Optional caller-supplied header enrichment
    enricher: Option<HeaderEnricher>,
}

impl ConsumerClient {
    /// Create a new consumer client
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a client with a caller-supplied header enricher
    pub fn with_enricher(config: ConsumerConfig, enricher: HeaderEnricher) -> Result<Self> {
        Self::build(config, Some(enricher))
    }

    fn build(config: ConsumerConfig, enricher: Option<HeaderEnricher>) -> Result<Self> {
        config.validate()?;
        config.log_config();

        let notifier = Arc::new(Notifier::new());
        Ok(Self {
            group_id: config.group_id.clone(),
            poll_timeout: config.poll_timeout(),
            connection: ConnectionManager::new(config, Arc::clone(&notifier)),
            notifier,
            enricher,
        })
    }

    /// Register a message-received listener
    pub fn on_message<F>(&self, listener: F)
    where
        F: Fn(&MessageEnvelope) + Send + Sync + 'static,
    {
        self.notifier.messages.register(listener);
    }

    /// Register an operational log listener
    pub fn on_log<F>(&self, listener: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.notifier.logs.register(listener);
    }

    /// Register an error listener
    pub fn on_error<F>(&self, listener: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.notifier.errors.register(listener);
    }

    /// True once the broker handle has been created
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Register topic interest with the broker
    ///
    /// Subscribing to nothing is a caller error, rejected before any
    /// connection attempt. Does not itself start pulling messages.
    pub fn subscribe(&self, topics: &[&str]) -> Result<()> {
        if topics.is_empty() {
            return Err(Error::config("at least one topic is required to subscribe"));
        }

        let consumer = self.connection.ensure_connected()?;
        consumer.subscribe(topics)?;

        info!(topics = ?topics, group_id = %self.group_id, "Subscribed to topics");
        self.notifier.log(
            Category::Subscription,
            format!("subscribed to {}", topics.join(", ")),
        );
        Ok(())
    }

    /// Run the blocking consume loop until cancellation
    ///
    /// Each iteration performs one bounded pull, skips end-of-stream
    /// and payload-less results, normalizes the rest into envelopes and
    /// dispatches them synchronously. Transient broker errors become
    /// error notifications and the loop continues; a header collision
    /// from the enricher propagates and ends the loop. Cancellation is
    /// observed at the pull boundary, so its latency is bounded by the
    /// poll timeout.
    pub fn listen(&self, cancel: &CancellationToken) -> Result<()> {
        let consumer = self.connection.ensure_connected()?;
        info!(group_id = %self.group_id, "Consume loop started");

        while !cancel.is_cancelled() {
            let message = match consumer.poll(self.poll_timeout) {
                None => continue,
                Some(Err(KafkaError::PartitionEOF(partition))) => {
                    debug!(partition = partition, "Reached end of partition");
                    continue;
                }
                Some(Err(e)) => {
                    self.notifier.error(Category::Consume, e.to_string());
                    continue;
                }
                Some(Ok(borrowed)) => borrowed.detach(),
            };

            let envelope = MessageEnvelope::from_message(
                &message,
                &self.group_id,
                self.enricher.as_ref(),
            )?;

            match envelope {
                // Tombstone or marker, never forwarded to listeners.
                None => continue,
                Some(envelope) => self.notifier.messages.emit(&envelope),
            }
        }

        info!(group_id = %self.group_id, "Consume loop stopped");
        Ok(())
    }

    /// Commit the consumer's current position for all assigned partitions
    ///
    /// Fire-and-forget: the commit is issued asynchronously and having
    /// nothing to commit is not an error.
    pub fn commit(&self) -> Result<()> {
        let consumer = self.connection.ensure_connected()?;

        match consumer.commit_consumer_state(CommitMode::Async) {
            Ok(()) => {}
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("No offsets to commit");
            }
            Err(e) => return Err(e.into()),
        }

        self.notifier
            .log(Category::Offset, "committed consumer position");
        Ok(())
    }

    /// Commit up to the offset represented by the envelope's receipt
    ///
    /// A receipt sourced from a different transport is a permissive
    /// no-op, not an error: the receipt is typed as opaque and callers
    /// may hand envelopes across transports.
    pub fn commit_envelope(&self, envelope: &MessageEnvelope) -> Result<()> {
        let receipt = match envelope.receipt() {
            Receipt::Kafka(receipt) => receipt,
            Receipt::Foreign => {
                debug!("Ignoring commit for receipt from another transport");
                return Ok(());
            }
        };

        let consumer = self.connection.ensure_connected()?;

        let mut positions = TopicPartitionList::new();
        positions.add_partition_offset(
            &receipt.topic,
            receipt.partition,
            Offset::Offset(receipt.offset + 1),
        )?;
        consumer.commit(&positions, CommitMode::Async)?;

        self.notifier.log(
            Category::Offset,
            format!(
                "committed {}[{}] up to offset {}",
                receipt.topic, receipt.partition, receipt.offset
            ),
        );
        Ok(())
    }

    /// Force redelivery from the last committed offset
    ///
    /// Re-applies the current partition assignment, resetting the next
    /// pull to the last committed position instead of advancing past
    /// the rejected message. This is the sole negative-acknowledgment
    /// mechanism; there is no per-message dead-lettering.
    pub fn reject(&self) -> Result<()> {
        let consumer = self.connection.ensure_connected()?;

        let assignment = consumer.assignment()?;
        consumer.assign(&assignment)?;

        warn!(group_id = %self.group_id, "Reassigned partitions for redelivery");
        self.notifier.log(
            Category::Offset,
            "reassigned current partitions for redelivery",
        );
        Ok(())
    }

    /// Release the broker handle
    ///
    /// Safe to call repeatedly or before any connection was made. The
    /// client must not be reused afterwards: subsequent operations fail
    /// fast instead of silently reconnecting.
    pub fn dispose(&self) {
        self.connection.dispose();
    }
}
