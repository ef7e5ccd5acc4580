//! Consumer configuration module
//!
//! This module handles loading and validating configuration from
//! environment variables, providing a strongly-typed configuration
//! structure for the consumer client and the translation into an
//! `rdkafka` client configuration.

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Broker address derived from configuration
///
/// Identifies which broker family and host set this client talks to.
/// Computed on demand; no independent lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Scheme name of the broker family
    pub scheme: &'static str,

    /// Endpoint string (comma-separated host:port pairs)
    pub endpoint: String,
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.endpoint)
    }
}

/// Consumer configuration settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct ConsumerConfig {
    /// Kafka broker addresses (comma-separated)
    #[serde(default = "default_brokers")]
    #[envconfig(from = "KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,

    /// Consumer group ID
    #[serde(default = "default_group_id")]
    #[envconfig(from = "KAFKA_GROUP_ID", default = "streambridge-consumer")]
    pub group_id: String,

    /// Auto offset reset (earliest, latest)
    ///
    /// Defaults to "earliest" so a new consumer group with no committed
    /// offsets starts from the beginning of the topic, not the end.
    #[serde(default = "default_auto_offset_reset")]
    #[envconfig(from = "KAFKA_AUTO_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "KAFKA_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,

    /// Maximum poll interval in milliseconds
    #[serde(default = "default_max_poll_interval")]
    #[envconfig(from = "KAFKA_MAX_POLL_INTERVAL_MS", default = "300000")]
    pub max_poll_interval_ms: u32,

    /// Poll timeout in milliseconds
    ///
    /// Upper bound on one blocking pull, which also bounds the
    /// cancellation latency of the consume loop.
    #[serde(default = "default_poll_timeout")]
    #[envconfig(from = "KAFKA_POLL_TIMEOUT_MS", default = "100")]
    pub poll_timeout_ms: u64,

    /// Security protocol (plaintext, ssl, sasl_plaintext, sasl_ssl)
    #[serde(default = "default_security_protocol")]
    #[envconfig(from = "KAFKA_SECURITY_PROTOCOL", default = "plaintext")]
    pub security_protocol: String,

    /// SASL mechanism (e.g. PLAIN, SCRAM-SHA-256)
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_MECHANISM")]
    pub sasl_mechanism: Option<String>,

    /// SASL username
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_USERNAME")]
    pub sasl_username: Option<String>,

    /// SASL password
    #[serde(default)]
    #[envconfig(from = "KAFKA_SASL_PASSWORD")]
    pub sasl_password: Option<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            group_id: default_group_id(),
            auto_offset_reset: default_auto_offset_reset(),
            session_timeout_ms: default_session_timeout(),
            max_poll_interval_ms: default_max_poll_interval(),
            poll_timeout_ms: default_poll_timeout(),
            security_protocol: default_security_protocol(),
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
        }
    }
}

impl ConsumerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenv::dotenv().ok();

        let config = <Self as Envconfig>::init_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(Error::config("Kafka brokers cannot be empty"));
        }

        if self.group_id.trim().is_empty() {
            return Err(Error::config("Consumer group ID cannot be empty"));
        }

        if self.auto_offset_reset != "earliest" && self.auto_offset_reset != "latest" {
            return Err(Error::config(format!(
                "Invalid auto offset reset '{}': expected 'earliest' or 'latest'",
                self.auto_offset_reset
            )));
        }

        if self.poll_timeout_ms == 0 {
            return Err(Error::config("Poll timeout must be at least 1ms"));
        }

        Ok(())
    }

    /// Get brokers as a vector
    pub fn brokers_list(&self) -> Vec<String> {
        self.brokers.split(',').map(|s| s.trim().to_string()).collect()
    }

    /// Get the broker address this client talks to
    pub fn broker_address(&self) -> BrokerAddress {
        BrokerAddress {
            scheme: "kafka",
            endpoint: self.brokers.clone(),
        }
    }

    /// Get poll timeout as Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Get session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms as u64)
    }

    /// Build rdkafka client configuration
    ///
    /// Auto-commit is disabled: offset progress is under manual control
    /// through the commit/reject surface. Partition EOF events are
    /// enabled so the consume loop can observe and skip end-of-stream
    /// markers instead of mistaking them for errors.
    pub fn build_client_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();

        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set(
                "max.poll.interval.ms",
                self.max_poll_interval_ms.to_string(),
            )
            .set("enable.partition.eof", "true")
            .set("security.protocol", &self.security_protocol);

        if let Some(mechanism) = &self.sasl_mechanism {
            config.set("sasl.mechanism", mechanism);
        }
        if let Some(username) = &self.sasl_username {
            config.set("sasl.username", username);
        }
        if let Some(password) = &self.sasl_password {
            config.set("sasl.password", password);
        }

        config
    }

    /// Log configuration (with sensitive data masked)
    pub fn log_config(&self) {
        tracing::info!(
            brokers = %self.brokers,
            group_id = %self.group_id,
            auto_offset_reset = %self.auto_offset_reset,
            security_protocol = %self.security_protocol,
            sasl_username = %self.sasl_username.as_deref().unwrap_or("-"),
            sasl_password = %self.sasl_password.as_ref().map(|_| "***").unwrap_or("-"),
            "Consumer configuration"
        );
    }
}

// Default value functions
fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "streambridge-consumer".to_string()
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}

fn default_max_poll_interval() -> u32 {
    300000 // 5 minutes
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_security_protocol() -> String {
    "plaintext".to_string()
}
