//! Transport-neutral message envelope and header normalization
//!
//! The consume loop turns each pulled Kafka message into a
//! [`MessageEnvelope`]: merged headers, raw payload bytes, the source
//! topic and a receipt for later offset control. The receipt is a
//! tagged capability handle; commit matches on the Kafka variant and
//! ignores receipts sourced from another transport.

use std::collections::HashMap;
use std::sync::Arc;

use rdkafka::message::{Headers, Message, OwnedMessage};

use crate::error::{Error, Result};

/// Reserved header key carrying the consumer group identifier
pub const GROUP_HEADER: &str = "group";

/// Caller-supplied header enrichment function
///
/// Invoked with the raw pull result; returned pairs are appended after
/// the native and reserved headers. A key that is already present
/// raises [`Error::HeaderCollision`] instead of silently overwriting.
pub type HeaderEnricher = Arc<dyn Fn(&OwnedMessage) -> HashMap<String, String> + Send + Sync>;

/// Position of one consumed Kafka message, used for commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Opaque acknowledgment handle carried by an envelope
///
/// `Foreign` represents a receipt sourced from a different transport;
/// offset operations treat it as a permissive no-op.
#[derive(Debug, Clone)]
pub enum Receipt {
    Kafka(KafkaReceipt),
    Foreign,
}

/// Normalized unit of delivery produced by the consume loop
///
/// Immutable after creation. Cloning is cheap enough for a listener to
/// retain the envelope and commit against its receipt later; the
/// receipt references the connection's assignment state and becomes
/// meaningless once the connection is disposed.
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    headers: HashMap<String, Option<String>>,
    payload: Vec<u8>,
    topic: String,
    receipt: Receipt,
}

impl MessageEnvelope {
    /// Construct an envelope directly
    ///
    /// The consume loop uses [`MessageEnvelope::from_message`]; this
    /// constructor exists for envelopes sourced from other transports.
    pub fn new(
        headers: HashMap<String, Option<String>>,
        payload: Vec<u8>,
        topic: String,
        receipt: Receipt,
    ) -> Self {
        Self {
            headers,
            payload,
            topic,
            receipt,
        }
    }

    /// Build an envelope from a pulled Kafka message
    ///
    /// Returns `Ok(None)` when the message carries no payload; such
    /// results are markers, not messages, and must never reach
    /// listeners. Header merge order: native headers first (a non-UTF-8
    /// value degrades to an absent string), then the reserved group
    /// header overwriting any native collision, then enrichment pairs
    /// which fail on any duplicate key.
    pub fn from_message(
        message: &OwnedMessage,
        group_id: &str,
        enricher: Option<&HeaderEnricher>,
    ) -> Result<Option<Self>> {
        let payload = match message.payload() {
            Some(payload) => payload.to_vec(),
            None => return Ok(None),
        };

        let mut headers: HashMap<String, Option<String>> = HashMap::new();

        if let Some(native) = message.headers() {
            for header in native.iter() {
                let value = header
                    .value
                    .and_then(|bytes| std::str::from_utf8(bytes).ok())
                    .map(String::from);
                headers.insert(header.key.to_string(), value);
            }
        }

        // Reserved key wins over a native header of the same name.
        headers.insert(GROUP_HEADER.to_string(), Some(group_id.to_string()));

        if let Some(enrich) = enricher {
            for (key, value) in enrich(message) {
                if headers.contains_key(&key) {
                    return Err(Error::HeaderCollision(key));
                }
                headers.insert(key, Some(value));
            }
        }

        let receipt = Receipt::Kafka(KafkaReceipt {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
        });

        Ok(Some(Self {
            headers,
            payload,
            topic: message.topic().to_string(),
            receipt,
        }))
    }

    /// Merged headers (keys unique; a value may be absent)
    pub fn headers(&self) -> &HashMap<String, Option<String>> {
        &self.headers
    }

    /// Raw payload bytes (may be empty, never semantically absent)
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Source topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Acknowledgment handle for commit/reject
    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::{Header, OwnedHeaders};
    use rdkafka::Timestamp;

    fn owned_message(
        payload: Option<Vec<u8>>,
        headers: Option<OwnedHeaders>,
    ) -> OwnedMessage {
        OwnedMessage::new(
            payload,
            Some(b"key".to_vec()),
            "orders".to_string(),
            Timestamp::NotAvailable,
            3,
            42,
            headers,
        )
    }

    #[test]
    fn test_group_header_appended_to_native_headers() {
        let headers = OwnedHeaders::new().insert(Header {
            key: "a",
            value: Some("1"),
        });
        let message = owned_message(Some(b"{}".to_vec()), Some(headers));

        let envelope = MessageEnvelope::from_message(&message, "g1", None)
            .unwrap()
            .expect("payload present");

        assert_eq!(envelope.headers().len(), 2);
        assert_eq!(
            envelope.headers().get("a"),
            Some(&Some("1".to_string()))
        );
        assert_eq!(
            envelope.headers().get(GROUP_HEADER),
            Some(&Some("g1".to_string()))
        );
        assert_eq!(envelope.topic(), "orders");
        assert_eq!(envelope.payload(), b"{}");
    }

    #[test]
    fn test_group_header_overwrites_native_collision() {
        let headers = OwnedHeaders::new().insert(Header {
            key: GROUP_HEADER,
            value: Some("native"),
        });
        let message = owned_message(Some(b"x".to_vec()), Some(headers));

        let envelope = MessageEnvelope::from_message(&message, "g1", None)
            .unwrap()
            .expect("payload present");

        assert_eq!(
            envelope.headers().get(GROUP_HEADER),
            Some(&Some("g1".to_string()))
        );
    }

    #[test]
    fn test_enricher_headers_appended_last() {
        let message = owned_message(Some(b"x".to_vec()), None);
        let enricher: HeaderEnricher = Arc::new(|_| {
            let mut extra = HashMap::new();
            extra.insert("trace-id".to_string(), "abc".to_string());
            extra
        });

        let envelope = MessageEnvelope::from_message(&message, "g1", Some(&enricher))
            .unwrap()
            .expect("payload present");

        assert_eq!(
            envelope.headers().get("trace-id"),
            Some(&Some("abc".to_string()))
        );
        assert_eq!(
            envelope.headers().get(GROUP_HEADER),
            Some(&Some("g1".to_string()))
        );
    }

    #[test]
    fn test_enricher_collision_on_reserved_key_raises() {
        let message = owned_message(Some(b"x".to_vec()), None);
        let enricher: HeaderEnricher = Arc::new(|_| {
            let mut extra = HashMap::new();
            extra.insert(GROUP_HEADER.to_string(), "g2".to_string());
            extra
        });

        let result = MessageEnvelope::from_message(&message, "g1", Some(&enricher));
        assert!(matches!(result, Err(Error::HeaderCollision(key)) if key == GROUP_HEADER));
    }

    #[test]
    fn test_enricher_collision_on_native_key_raises() {
        let headers = OwnedHeaders::new().insert(Header {
            key: "a",
            value: Some("1"),
        });
        let message = owned_message(Some(b"x".to_vec()), Some(headers));
        let enricher: HeaderEnricher = Arc::new(|_| {
            let mut extra = HashMap::new();
            extra.insert("a".to_string(), "2".to_string());
            extra
        });

        let result = MessageEnvelope::from_message(&message, "g1", Some(&enricher));
        assert!(matches!(result, Err(Error::HeaderCollision(key)) if key == "a"));
    }

    #[test]
    fn test_non_utf8_header_value_degrades_to_absent() {
        let headers = OwnedHeaders::new().insert(Header {
            key: "binary",
            value: Some(&[0xff, 0xfe, 0xfd][..]),
        });
        let message = owned_message(Some(b"x".to_vec()), Some(headers));

        let envelope = MessageEnvelope::from_message(&message, "g1", None)
            .unwrap()
            .expect("payload present");

        assert_eq!(envelope.headers().get("binary"), Some(&None));
    }

    #[test]
    fn test_null_header_value_is_absent() {
        let headers = OwnedHeaders::new().insert(Header::<&[u8]> {
            key: "empty",
            value: None,
        });
        let message = owned_message(Some(b"x".to_vec()), Some(headers));

        let envelope = MessageEnvelope::from_message(&message, "g1", None)
            .unwrap()
            .expect("payload present");

        assert_eq!(envelope.headers().get("empty"), Some(&None));
    }

    #[test]
    fn test_absent_payload_produces_no_envelope() {
        let message = owned_message(None, None);
        let envelope = MessageEnvelope::from_message(&message, "g1", None).unwrap();
        assert!(envelope.is_none());
    }

    #[test]
    fn test_receipt_carries_position() {
        let message = owned_message(Some(b"x".to_vec()), None);
        let envelope = MessageEnvelope::from_message(&message, "g1", None)
            .unwrap()
            .expect("payload present");

        match envelope.receipt() {
            Receipt::Kafka(receipt) => {
                assert_eq!(receipt.topic, "orders");
                assert_eq!(receipt.partition, 3);
                assert_eq!(receipt.offset, 42);
            }
            Receipt::Foreign => panic!("expected a Kafka receipt"),
        }
    }
}
