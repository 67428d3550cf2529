//! Common test utilities
//!
//! Shared helpers for integration tests.

#![allow(dead_code)]

use delayq::storage::Keys;
use delayq::{MemoryStore, SchedulerFactory, Store, StoreConfig, TaskScheduler};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Polling interval short enough to keep tests fast
pub const FAST_POLL: Duration = Duration::from_millis(20);

/// Unique topic per test run so parallel tests never share keys
pub fn test_topic(test_name: &str) -> String {
    format!("test-{}-{}", test_name, uuid::Uuid::new_v4())
}

/// Current time in epoch milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Factory over a fresh in-memory store, plus the store for inspection
pub fn memory_factory() -> (SchedulerFactory, MemoryStore) {
    let store = MemoryStore::new();
    let factory = SchedulerFactory::new(Arc::new(store.clone()));
    (factory, store)
}

/// Scheduler with [`FAST_POLL`]
pub fn fast_scheduler<T>(factory: &SchedulerFactory, topic: &str) -> TaskScheduler<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    factory
        .scheduler_with_interval(topic, FAST_POLL)
        .expect("Failed to create scheduler")
}

/// Redis URL from `REDIS_URL`, defaulting to localhost
pub fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string())
}

/// Factory connected to the Redis server under test
pub async fn redis_factory() -> SchedulerFactory {
    let config = StoreConfig::from_url(&redis_url()).expect("Invalid REDIS_URL");
    let factory = SchedulerFactory::connect(config)
        .await
        .expect("Failed to create factory");
    tokio::time::timeout(Duration::from_secs(5), factory.connection().wait_reachable())
        .await
        .expect("Redis did not become reachable")
        .expect("Redis connection failed");
    factory
}

/// Remove every key a topic may have created
pub async fn cleanup(store: &dyn Store, topic: &str) {
    let _ = store.del(&Keys::counter(topic)).await;
    let _ = store.del(&Keys::due_index(topic)).await;
}
