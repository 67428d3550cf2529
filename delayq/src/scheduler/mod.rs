//! Task scheduler
//!
//! A [`TaskScheduler`] is bound to one topic and one payload type. Producers
//! call [`TaskScheduler::schedule`]; consumers call [`TaskScheduler::listen`]
//! and receive payloads once their due time has passed, earliest first.
//!
//! Store layout per topic (see [`Keys`]):
//! - `scheduleCounter_<topic>`: id counter
//! - `<topic>_task:<id>`: serialized payload
//! - `sortedTasks_<topic>`: due index, member = id, score = due time (ms)
//!
//! Delivery is at-least-once. Two subscriptions on the same topic may both
//! read a task before either removes it; run one consumer per topic.

pub mod factory;
pub mod subscription;

pub use factory::{SchedulerFactory, SchedulerFactoryBuilder};
pub use subscription::{Subscription, SubscriptionHandle};

use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::SchedulerOptions;
use crate::observability::SchedulerMetrics;
use crate::storage::{Keys, Store};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Task identifier, unique within a topic and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one pass over the due index
pub(crate) enum Dispatch<T> {
    /// Nothing is due
    Idle,
    /// A due task was consumed but had no payload
    Skipped,
    /// A due task was consumed and decoded
    Delivered(T),
}

pub(crate) struct Shared<T, C> {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) topic: String,
    pub(crate) options: SchedulerOptions,
    pub(crate) codec: C,
    pub(crate) metrics: Option<SchedulerMetrics>,
    _marker: PhantomData<fn() -> T>,
}

/// Scheduler for one topic and payload type
pub struct TaskScheduler<T, C = JsonCodec<T>> {
    shared: Arc<Shared<T, C>>,
}

impl<T, C> Clone for TaskScheduler<T, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, C> TaskScheduler<T, C>
where
    T: Send + 'static,
    C: PayloadCodec<T> + 'static,
{
    /// Create a scheduler over an existing store
    ///
    /// Most callers go through [`SchedulerFactory`] instead.
    pub fn new(
        store: Arc<dyn Store>,
        topic: impl Into<String>,
        options: SchedulerOptions,
        codec: C,
        metrics: Option<SchedulerMetrics>,
    ) -> Result<Self> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(Error::Config("topic cannot be empty".into()));
        }
        options.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                topic,
                options,
                codec,
                metrics,
                _marker: PhantomData,
            }),
        })
    }

    /// Topic this scheduler is bound to
    pub fn topic(&self) -> &str {
        &self.shared.topic
    }

    /// Delay between polls while nothing is due
    pub fn polling_interval(&self) -> Duration {
        self.shared.options.polling_interval
    }

    /// Schedule a payload for delivery at `due_at` (epoch milliseconds)
    ///
    /// Allocates an id, writes the payload, then indexes it. Returns once the
    /// task is indexed; does not wait for it to become due. Waits for the
    /// store to be reachable first and fails only if the transport has given
    /// up or a write fails.
    pub async fn schedule(&self, payload: &T, due_at: i64) -> Result<TaskId> {
        let shared = &self.shared;
        let raw = shared.codec.encode(payload)?;

        shared.store.connection().wait_reachable().await?;

        let id = TaskId(shared.store.incr(&Keys::counter(&shared.topic)).await?);
        let member = id.to_string();

        let previous = shared
            .store
            .set(&Keys::payload(&shared.topic, &member), &raw)
            .await?;
        if previous.is_some() {
            tracing::warn!("Task {} on topic '{}' overwrote a stale payload", id, shared.topic);
        }

        shared
            .store
            .zadd(&Keys::due_index(&shared.topic), &member, due_at)
            .await?;

        if let Some(metrics) = &shared.metrics {
            metrics.record_scheduled(&shared.topic);
        }

        tracing::debug!("Task {} scheduled on topic '{}' for {}", id, shared.topic, due_at);
        Ok(id)
    }

    /// Schedule a payload for delivery at a point in time
    pub async fn schedule_at(&self, payload: &T, due_at: DateTime<Utc>) -> Result<TaskId> {
        self.schedule(payload, due_at.timestamp_millis()).await
    }

    /// Schedule a payload for delivery after a delay
    pub async fn schedule_in(&self, payload: &T, delay: Duration) -> Result<TaskId> {
        let delay_ms = i64::try_from(delay.as_millis())
            .map_err(|_| Error::Config(format!("delay {:?} is out of range", delay)))?;
        self.schedule(payload, Utc::now().timestamp_millis().saturating_add(delay_ms))
            .await
    }

    /// Number of tasks currently indexed, due or not
    pub async fn pending(&self) -> Result<u64> {
        self.shared
            .store
            .zcard(&Keys::due_index(&self.shared.topic))
            .await
    }

    /// Subscribe to due payloads
    ///
    /// The returned stream is lazy: nothing is queried until it is polled.
    /// Each call starts an independent poll loop. The loop pauses while the
    /// store is unreachable and resumes on reconnect. The stream ends after
    /// yielding a decode error or a reconnect-exhausted error, or once
    /// cancelled through its [`SubscriptionHandle`] or dropped.
    pub fn listen(&self) -> Subscription<T> {
        Subscription::start(Arc::clone(&self.shared))
    }
}

impl<T, C> Shared<T, C>
where
    C: PayloadCodec<T>,
{
    /// Take the earliest due task, if any
    ///
    /// The task's payload and index entry are removed whatever the decode
    /// result. Cleanup failures are logged and do not stop delivery.
    pub(crate) async fn dispatch_next(&self) -> Result<Dispatch<T>> {
        let index_key = Keys::due_index(&self.topic);
        let now = Utc::now().timestamp_millis();

        let Some(task_id) = self
            .store
            .zrange_by_score(&index_key, now, 1)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(Dispatch::Idle);
        };

        let payload_key = Keys::payload(&self.topic, &task_id);
        let raw = self.store.get(&payload_key).await?;
        let decoded = raw.map(|raw| self.codec.decode(&raw));

        let (del, zrem) = tokio::join!(
            self.store.del(&payload_key),
            self.store.zrem(&index_key, &task_id)
        );
        if let Err(e) = del.and(zrem) {
            tracing::warn!("Cleanup of task {} on topic '{}' failed: {}", task_id, self.topic, e);
        }

        match decoded {
            None => {
                tracing::warn!("Task {} on topic '{}' has no payload, skipping", task_id, self.topic);
                if let Some(metrics) = &self.metrics {
                    metrics.record_missing_payload(&self.topic);
                }
                Ok(Dispatch::Skipped)
            }
            Some(Ok(value)) => {
                tracing::debug!("Task {} on topic '{}' delivered", task_id, self.topic);
                if let Some(metrics) = &self.metrics {
                    metrics.record_delivered(&self.topic);
                }
                Ok(Dispatch::Delivered(value))
            }
            Some(Err(reason)) => {
                tracing::error!("Task {} on topic '{}' has a malformed payload: {}", task_id, self.topic, reason);
                if let Some(metrics) = &self.metrics {
                    metrics.record_decode_failure(&self.topic);
                }
                Err(Error::Deserialization {
                    topic: self.topic.clone(),
                    task_id,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::{json, Value};

    fn scheduler(store: &MemoryStore, topic: &str) -> TaskScheduler<Value> {
        TaskScheduler::new(
            Arc::new(store.clone()),
            topic,
            SchedulerOptions::default(),
            JsonCodec::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_topic() {
        let result = TaskScheduler::<Value>::new(
            Arc::new(MemoryStore::new()),
            "",
            SchedulerOptions::default(),
            JsonCodec::new(),
            None,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_schedule_writes_payload_then_index() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");

        let first = jobs.schedule(&json!({"a": 1}), 1_000).await.unwrap();
        let second = jobs.schedule(&json!({"a": 2}), 500).await.unwrap();
        assert_eq!(first, TaskId(1));
        assert_eq!(second, TaskId(2));

        assert_eq!(
            store.get("jobs_task:1").await.unwrap(),
            Some(r#"{"a":1}"#.to_string())
        );
        assert_eq!(
            store.zrange_by_score("sortedTasks_jobs", 1_000, 10).await.unwrap(),
            vec!["2", "1"]
        );
        assert_eq!(jobs.pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ids_are_per_topic() {
        let store = MemoryStore::new();
        let a = scheduler(&store, "a");
        let b = scheduler(&store, "b");

        assert_eq!(a.schedule(&json!(1), 0).await.unwrap(), TaskId(1));
        assert_eq!(b.schedule(&json!(1), 0).await.unwrap(), TaskId(1));
        assert_eq!(a.schedule(&json!(2), 0).await.unwrap(), TaskId(2));
    }

    #[tokio::test]
    async fn test_dispatch_consumes_earliest() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");
        jobs.schedule(&json!("late"), 2_000).await.unwrap();
        jobs.schedule(&json!("early"), 1_000).await.unwrap();

        match jobs.shared.dispatch_next().await.unwrap() {
            Dispatch::Delivered(value) => assert_eq!(value, json!("early")),
            _ => panic!("expected a delivery"),
        }
        assert_eq!(store.get("jobs_task:2").await.unwrap(), None);
        assert_eq!(jobs.pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_idle_when_nothing_due() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");
        jobs.schedule_in(&json!(1), Duration::from_secs(3600)).await.unwrap();

        assert!(matches!(jobs.shared.dispatch_next().await.unwrap(), Dispatch::Idle));
        assert_eq!(jobs.pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_skips_missing_payload() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");
        store.zadd("sortedTasks_jobs", "9", 0).await.unwrap();

        assert!(matches!(jobs.shared.dispatch_next().await.unwrap(), Dispatch::Skipped));
        assert_eq!(jobs.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_removes_malformed_payload() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");
        store.set("jobs_task:5", "{not json").await.unwrap();
        store.zadd("sortedTasks_jobs", "5", 0).await.unwrap();

        let err = match jobs.shared.dispatch_next().await {
            Err(e) => e,
            Ok(_) => panic!("expected a decode error"),
        };
        assert!(matches!(err, Error::Deserialization { ref task_id, .. } if task_id == "5"));
        assert_eq!(store.get("jobs_task:5").await.unwrap(), None);
        assert_eq!(jobs.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schedule_at_uses_millis() {
        let store = MemoryStore::new();
        let jobs = scheduler(&store, "jobs");
        let due = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        jobs.schedule_at(&json!(1), due).await.unwrap();

        assert!(store
            .zrange_by_score("sortedTasks_jobs", 1_700_000_000_122, 1)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store.zrange_by_score("sortedTasks_jobs", 1_700_000_000_123, 1).await.unwrap(),
            vec!["1"]
        );
    }
}
