//! Statistics command handlers
//!
//! Provides commands for displaying topic statistics.

use color_eyre::Result;
use delayq::SchedulerFactory;
use serde_json::Value;

/// Show statistics for a topic
pub async fn show(factory: &SchedulerFactory, topic: &str) -> Result<()> {
    let scheduler = factory.scheduler::<Value>(topic)?;
    let pending = scheduler.pending().await?;
    let link = factory.connection().status();

    println!("Statistics");
    println!("  Topic: {}", topic);
    println!("  Pending: {}", pending);
    println!("  Store: {} (since {})", link.state, link.changed_at.to_rfc3339());

    Ok(())
}
