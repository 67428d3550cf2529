//! Storage layer
//!
//! The [`Store`] trait is the narrow contract the scheduler needs from the
//! backing store: an atomic counter, string values, and one ordered set per
//! topic. [`RedisStore`] is the production implementation, [`MemoryStore`]
//! keeps everything in process.

pub mod keys;
pub mod memory;
pub mod redis;

pub use keys::Keys;
pub use memory::MemoryStore;
pub use redis::RedisStore;

use crate::connection::ConnectionState;
use crate::Result;
use async_trait::async_trait;

/// Store client primitives
///
/// Each call is one round trip and is not retried here; reconnection is the
/// transport's job and is reported through [`Store::connection`].
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Atomically increment a counter and return the new value. A missing
    /// counter starts at 0.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Overwrite a string value, returning the previous one
    async fn set(&self, key: &str, value: &str) -> Result<Option<String>>;

    /// Read a string value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a string value. Deleting a missing key is not an error.
    async fn del(&self, key: &str) -> Result<()>;

    /// Add a member to an ordered set (or update its score)
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<()>;

    /// Remove a member from an ordered set. Removing a missing member is
    /// not an error.
    async fn zrem(&self, key: &str, member: &str) -> Result<()>;

    /// Members with `score <= max`, lowest score first, at most `limit`
    async fn zrange_by_score(&self, key: &str, max: i64, limit: usize) -> Result<Vec<String>>;

    /// Number of members in an ordered set
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// Reachability of this store
    fn connection(&self) -> &ConnectionState;
}
