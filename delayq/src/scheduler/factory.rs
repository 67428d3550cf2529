//! Scheduler factory
//!
//! Binds one store client and mints per-topic schedulers. The factory keeps
//! no per-topic state; everything lives in the store.

use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::{SchedulerOptions, StoreConfig};
use crate::connection::ConnectionState;
use crate::observability::SchedulerMetrics;
use crate::scheduler::TaskScheduler;
use crate::storage::{RedisStore, Store};
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Factory for [`TaskScheduler`]s sharing one store connection
///
/// # Example
///
/// ```rust,no_run
/// use delayq::SchedulerFactory;
/// use futures::StreamExt;
///
/// # async fn example() -> delayq::Result<()> {
/// let factory = SchedulerFactory::builder()
///     .host("localhost")
///     .port(6379)
///     .connect()
///     .await?;
///
/// let jobs = factory.scheduler::<serde_json::Value>("jobs")?;
/// jobs.schedule_in(&serde_json::json!({"a": 1}), std::time::Duration::from_secs(5)).await?;
///
/// let mut deliveries = jobs.listen();
/// while let Some(payload) = deliveries.next().await {
///     println!("{}", payload?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SchedulerFactory {
    store: Arc<dyn Store>,
    metrics: Option<SchedulerMetrics>,
}

impl SchedulerFactory {
    /// Create a factory builder
    pub fn builder() -> SchedulerFactoryBuilder {
        SchedulerFactoryBuilder::default()
    }

    /// Create a factory over an existing store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, metrics: None }
    }

    /// Connect to Redis and create a factory
    ///
    /// Does not wait for the server; schedulers wait for reachability on
    /// their own.
    pub async fn connect(config: StoreConfig) -> Result<Self> {
        let store = RedisStore::connect(&config).await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Record metrics for every scheduler minted from now on
    #[must_use]
    pub fn with_metrics(mut self, metrics: SchedulerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The shared store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Reachability of the shared store
    pub fn connection(&self) -> &ConnectionState {
        self.store.connection()
    }

    /// Attached metrics, if any
    pub fn metrics(&self) -> Option<&SchedulerMetrics> {
        self.metrics.as_ref()
    }

    /// Scheduler with the default 1 second polling interval and JSON payloads
    pub fn scheduler<T>(&self, topic: impl Into<String>) -> Result<TaskScheduler<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.scheduler_with_options(topic, SchedulerOptions::default())
    }

    /// Scheduler with a custom polling interval and JSON payloads
    pub fn scheduler_with_interval<T>(
        &self,
        topic: impl Into<String>,
        polling_interval: Duration,
    ) -> Result<TaskScheduler<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.scheduler_with_options(
            topic,
            SchedulerOptions::default().with_polling_interval(polling_interval),
        )
    }

    /// Scheduler with custom options and JSON payloads
    pub fn scheduler_with_options<T>(
        &self,
        topic: impl Into<String>,
        options: SchedulerOptions,
    ) -> Result<TaskScheduler<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        self.scheduler_with_codec(topic, options, JsonCodec::new())
    }

    /// Scheduler with custom options and a custom payload codec
    pub fn scheduler_with_codec<T, C>(
        &self,
        topic: impl Into<String>,
        options: SchedulerOptions,
        codec: C,
    ) -> Result<TaskScheduler<T, C>>
    where
        T: Send + 'static,
        C: PayloadCodec<T> + 'static,
    {
        TaskScheduler::new(
            Arc::clone(&self.store),
            topic,
            options,
            codec,
            self.metrics.clone(),
        )
    }
}

/// Factory builder
#[derive(Default)]
pub struct SchedulerFactoryBuilder {
    config: StoreConfig,
    metrics: Option<SchedulerMetrics>,
}

impl SchedulerFactoryBuilder {
    /// Set the full store configuration
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the Redis host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the Redis port
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the logical database index
    #[must_use]
    pub fn database(mut self, database: u8) -> Self {
        self.config.database = database;
        self
    }

    /// Bound the reconnect backoff
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Attach metrics
    #[must_use]
    pub fn metrics(mut self, metrics: SchedulerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Connect to Redis and build the factory
    pub async fn connect(self) -> Result<SchedulerFactory> {
        let factory = SchedulerFactory::connect(self.config).await?;
        Ok(match self.metrics {
            Some(metrics) => factory.with_metrics(metrics),
            None => factory,
        })
    }
}
