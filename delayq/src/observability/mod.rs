//! Observability module
//!
//! Provides Prometheus metrics for scheduling and delivery.

pub mod metrics;

pub use metrics::SchedulerMetrics;
