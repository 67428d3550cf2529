//! In-memory store implementation.
//!
//! Honors the same contract as [`RedisStore`](super::RedisStore) inside one
//! process. Outages can be simulated with [`MemoryStore::set_reachable`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fred::error::{RedisError, RedisErrorKind};
use tokio::sync::Mutex;

use crate::connection::ConnectionState;
use crate::storage::Store;
use crate::{Error, Result};

/// One ordered set: members sorted by `(score, member)` like Redis does for
/// equal scores, plus a reverse lookup for removal.
#[derive(Debug, Default)]
struct OrderedSet {
    entries: BTreeSet<(i64, String)>,
    scores: HashMap<String, i64>,
}

impl OrderedSet {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.entries.remove(&(old, member.to_string()));
        }
        self.entries.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) {
        if let Some(old) = self.scores.remove(member) {
            self.entries.remove(&(old, member.to_string()));
        }
    }
}

/// Counters live in `strings` as decimal text, like Redis stores them
#[derive(Debug, Default)]
struct MemoryState {
    strings: HashMap<String, String>,
    sets: HashMap<String, OrderedSet>,
}

/// In-process store
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    connection: ConnectionState,
    range_queries: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, reachable store
    pub fn new() -> Self {
        let connection = ConnectionState::new();
        connection.set_connected();
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            connection,
            range_queries: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Simulate losing or regaining the connection
    pub fn set_reachable(&self, reachable: bool) {
        if reachable {
            self.connection.set_connected();
        } else {
            self.connection.set_disconnected();
        }
    }

    /// Simulate the transport giving up
    pub fn exhaust(&self, reason: &str) {
        self.connection.set_exhausted(reason);
    }

    /// Number of range queries served so far
    pub fn range_queries(&self) -> u64 {
        self.range_queries.load(Ordering::SeqCst)
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.connection.is_reachable() {
            Ok(())
        } else {
            Err(Error::Connection("memory store is unreachable".into()))
        }
    }
}

fn not_an_integer() -> Error {
    Error::Redis(RedisError::new(
        RedisErrorKind::InvalidArgument,
        "value is not an integer or out of range",
    ))
}

#[async_trait]
impl Store for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        let current = match state.strings.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| not_an_integer())?,
            None => 0,
        };
        let next = current.checked_add(1).ok_or_else(not_an_integer)?;
        state.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn set(&self, key: &str, value: &str) -> Result<Option<String>> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        Ok(state.strings.insert(key.to_string(), value.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.strings.get(key).cloned())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        state.strings.remove(key);
        state.sets.remove(key);
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        state.sets.entry(key.to_string()).or_default().insert(member, score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        self.ensure_reachable()?;
        let mut state = self.state.lock().await;
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            if set.entries.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn zrange_by_score(&self, key: &str, max: i64, limit: usize) -> Result<Vec<String>> {
        self.ensure_reachable()?;
        self.range_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().await;
        let members = state
            .sets
            .get(key)
            .map(|set| {
                set.entries
                    .iter()
                    .take_while(|(score, _)| *score <= max)
                    .take(limit)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        self.ensure_reachable()?;
        let state = self.state.lock().await;
        Ok(state.sets.get(key).map(|set| set.entries.len() as u64).unwrap_or(0))
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counter_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert_eq!(store.incr("c").await.unwrap(), 2);
        assert_eq!(store.incr("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counter_is_a_string_value() {
        let store = MemoryStore::new();
        store.incr("c").await.unwrap();
        store.incr("c").await.unwrap();
        assert_eq!(store.get("c").await.unwrap(), Some("2".to_string()));

        store.set("c", "41").await.unwrap();
        assert_eq!(store.incr("c").await.unwrap(), 42);

        store.set("text", "hello").await.unwrap();
        assert!(matches!(store.incr("text").await, Err(Error::Redis(_))));

        store.del("c").await.unwrap();
        assert_eq!(store.get("c").await.unwrap(), None);
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_returns_previous() {
        let store = MemoryStore::new();
        assert_eq!(store.set("k", "a").await.unwrap(), None);
        assert_eq!(store.set("k", "b").await.unwrap(), Some("a".into()));
        assert_eq!(store.get("k").await.unwrap(), Some("b".into()));
    }

    #[tokio::test]
    async fn test_idempotent_removal() {
        let store = MemoryStore::new();
        store.del("missing").await.unwrap();
        store.zrem("missing", "1").await.unwrap();

        store.zadd("z", "1", 10).await.unwrap();
        store.zrem("z", "1").await.unwrap();
        store.zrem("z", "1").await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_range_by_score() {
        let store = MemoryStore::new();
        store.zadd("z", "3", 30).await.unwrap();
        store.zadd("z", "1", 10).await.unwrap();
        store.zadd("z", "2", 20).await.unwrap();

        assert_eq!(store.zrange_by_score("z", 25, 10).await.unwrap(), vec!["1", "2"]);
        assert_eq!(store.zrange_by_score("z", 100, 1).await.unwrap(), vec!["1"]);
        assert!(store.zrange_by_score("z", 5, 10).await.unwrap().is_empty());
        assert!(store.zrange_by_score("none", 100, 10).await.unwrap().is_empty());
        assert_eq!(store.range_queries(), 4);
    }

    #[tokio::test]
    async fn test_zadd_updates_score() {
        let store = MemoryStore::new();
        store.zadd("z", "1", 50).await.unwrap();
        store.zadd("z", "2", 20).await.unwrap();
        store.zadd("z", "1", 10).await.unwrap();

        assert_eq!(store.zrange_by_score("z", 100, 10).await.unwrap(), vec!["1", "2"]);
        assert_eq!(store.zcard("z").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_fails_operations() {
        let store = MemoryStore::new();
        store.set_reachable(false);
        assert!(!store.connection().is_reachable());

        let err = store.incr("c").await.unwrap_err();
        assert!(err.is_transport());

        store.set_reachable(true);
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }
}
