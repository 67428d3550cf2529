//! Error type definitions
//!
//! Provides all possible error types in the delayq scheduler.

/// Result type alias for delayq
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the delayq scheduler
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Redis transport errors (a single round trip failed)
    #[error("Redis error: {0}")]
    Redis(#[from] fred::error::RedisError),

    /// Payload could not be encoded before scheduling
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload stored under a task key could not be decoded
    #[error("Deserialization error for task {task_id} on topic '{topic}': {reason}")]
    Deserialization {
        /// Topic the task belonged to
        topic: String,
        /// Identifier of the poisoned task
        task_id: String,
        /// Decoder message
        reason: String,
    },

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport gave up reconnecting
    #[error("Reconnect retries exhausted: {0}")]
    RetriesExhausted(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if the error comes from the transport and may clear up once the
    /// store is reachable again
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Redis(_) | Error::Connection(_))
    }

    /// Check if the error is fatal (non-recoverable)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::RetriesExhausted(_) | Error::Config(_) | Error::Deserialization { .. }
        )
    }
}
