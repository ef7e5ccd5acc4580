//! Error handling module for streambridge
//!
//! This module defines the error types used throughout the crate,
//! providing a unified error handling strategy that mirrors the
//! propagation policy of the consumer client: configuration and
//! connection errors surface synchronously to the caller, while
//! transient broker conditions travel through the notification
//! channel instead of `Err` returns.

use thiserror::Error;

/// Result type alias for streambridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for streambridge
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (invalid settings, empty topic sets)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure constructing the broker connection handle
    #[error("Connection error: {0}")]
    Connection(String),

    /// Errors surfaced by the underlying Kafka client
    #[error("Kafka error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    /// Duplicate header key produced by a caller-supplied enricher
    #[error("Header collision: key '{0}' is already present")]
    HeaderCollision(String),

    /// Operation attempted on a disposed client
    #[error("Client has been disposed")]
    Disposed,
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Error::Connection(msg.into())
    }

    /// Check if this error is retryable
    ///
    /// Connection failures leave the handle absent, so the same call can
    /// be retried. Configuration errors, header collisions and
    /// use-after-dispose are caller bugs and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Broker(_))
    }
}

/// Convert from envconfig::Error to our Error type
impl From<envconfig::Error> for Error {
    fn from(err: envconfig::Error) -> Self {
        Error::Config(err.to_string())
    }
}
