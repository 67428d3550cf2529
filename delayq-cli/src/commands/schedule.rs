//! Schedule command handler

use chrono::{DateTime, Utc};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use delayq::SchedulerFactory;
use serde_json::Value;

/// Resolve the due time in epoch milliseconds
///
/// `at` wins over `delay_ms`; with neither the task is due immediately.
pub fn resolve_due(delay_ms: Option<u64>, at: Option<i64>, now: DateTime<Utc>) -> Result<i64> {
    let now = now.timestamp_millis();
    match (at, delay_ms) {
        (Some(at), _) => Ok(at),
        (None, Some(delay)) => {
            let delay = i64::try_from(delay).map_err(|_| eyre!("delay {} ms is out of range", delay))?;
            Ok(now.saturating_add(delay))
        }
        (None, None) => Ok(now),
    }
}

/// Schedule a JSON payload on a topic
pub async fn run(factory: &SchedulerFactory, topic: &str, payload: &str, due_at: i64) -> Result<()> {
    let payload: Value =
        serde_json::from_str(payload).map_err(|e| eyre!("Payload is not valid JSON: {}", e))?;

    let scheduler = factory.scheduler::<Value>(topic)?;
    let id = scheduler.schedule(&payload, due_at).await?;

    let due = DateTime::<Utc>::from_timestamp_millis(due_at)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| due_at.to_string());
    println!("Task {} scheduled on '{}' for {}", id, topic, due);

    Ok(())
}
