//! Prometheus metrics collector for delayq
//!
//! Tracks scheduled and delivered tasks per topic, poisoned payloads, and
//! store reachability.

use prometheus::{IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// delayq metrics collector
#[derive(Clone)]
pub struct SchedulerMetrics {
    registry: Arc<Registry>,

    // Task counters
    tasks_scheduled_total: IntCounterVec,
    tasks_delivered_total: IntCounterVec,
    decode_failures_total: IntCounterVec,
    missing_payloads_total: IntCounterVec,

    // Store link
    store_reachable: IntGauge,
}

impl SchedulerMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tasks_scheduled_total = IntCounterVec::new(
            Opts::new("delayq_tasks_scheduled_total", "Total number of tasks scheduled"),
            &["topic"],
        )?;

        let tasks_delivered_total = IntCounterVec::new(
            Opts::new("delayq_tasks_delivered_total", "Total number of tasks delivered to consumers"),
            &["topic"],
        )?;

        let decode_failures_total = IntCounterVec::new(
            Opts::new("delayq_decode_failures_total", "Total number of payloads that failed to decode"),
            &["topic"],
        )?;

        let missing_payloads_total = IntCounterVec::new(
            Opts::new(
                "delayq_missing_payloads_total",
                "Total number of due tasks whose payload was already gone",
            ),
            &["topic"],
        )?;

        let store_reachable = IntGauge::with_opts(Opts::new(
            "delayq_store_reachable",
            "Whether the backing store is reachable (1) or not (0)",
        ))?;

        registry.register(Box::new(tasks_scheduled_total.clone()))?;
        registry.register(Box::new(tasks_delivered_total.clone()))?;
        registry.register(Box::new(decode_failures_total.clone()))?;
        registry.register(Box::new(missing_payloads_total.clone()))?;
        registry.register(Box::new(store_reachable.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            tasks_scheduled_total,
            tasks_delivered_total,
            decode_failures_total,
            missing_payloads_total,
            store_reachable,
        })
    }

    /// Record task scheduled
    pub fn record_scheduled(&self, topic: &str) {
        self.tasks_scheduled_total.with_label_values(&[topic]).inc();
    }

    /// Record task delivered
    pub fn record_delivered(&self, topic: &str) {
        self.tasks_delivered_total.with_label_values(&[topic]).inc();
    }

    /// Record a payload that failed to decode
    pub fn record_decode_failure(&self, topic: &str) {
        self.decode_failures_total.with_label_values(&[topic]).inc();
    }

    /// Record a due task without payload
    pub fn record_missing_payload(&self, topic: &str) {
        self.missing_payloads_total.with_label_values(&[topic]).inc();
    }

    /// Update store reachability
    pub fn set_store_reachable(&self, reachable: bool) {
        self.store_reachable.set(i64::from(reachable));
    }

    /// Get the registry for custom metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gather metrics in Prometheus text format
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }
}
