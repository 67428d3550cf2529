//! Listen command handler
//!
//! Prints each due payload as one JSON line on stdout. Logs go to stderr.

use color_eyre::Result;
use delayq::SchedulerFactory;
use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;

/// Consume a topic until the limit is reached or Ctrl-C is pressed
pub async fn run(
    factory: &SchedulerFactory,
    topic: &str,
    interval: Duration,
    limit: Option<usize>,
) -> Result<()> {
    let scheduler = factory.scheduler_with_interval::<Value>(topic, interval)?;
    let mut due = scheduler.listen();
    let mut received = 0usize;

    while limit.map_or(true, |limit| received < limit) {
        tokio::select! {
            item = due.next() => match item {
                Some(Ok(payload)) => {
                    println!("{}", payload);
                    received += 1;
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping listener on '{}'", topic);
                break;
            }
        }
    }

    tracing::debug!("Received {} payloads from '{}'", received, topic);
    Ok(())
}
