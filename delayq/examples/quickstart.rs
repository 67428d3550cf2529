//! Delayq quickstart example
//!
//! Schedules a few reminders with different delays and prints them as they
//! fall due, earliest first.
//!
//! Run with:
//!   cargo run --example quickstart

use delayq::{SchedulerFactory, SchedulerMetrics, StoreConfig};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reminder payload
#[derive(Debug, Serialize, Deserialize)]
struct Reminder {
    user: String,
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match std::env::var("REDIS_URL") {
        Ok(url) => StoreConfig::from_url(&url)?,
        Err(_) => StoreConfig::default(),
    };

    let metrics = SchedulerMetrics::new()?;
    let factory = SchedulerFactory::connect(config)
        .await?
        .with_metrics(metrics.clone());

    println!("Delayq Quickstart Example\n");

    let topic = format!("quickstart-{}", std::process::id());
    let reminders = factory.scheduler_with_interval::<Reminder>(&topic, Duration::from_millis(200))?;

    // 1. Schedule out of order
    println!("1. Scheduling reminders...");
    for (user, delay) in [("carol", 3), ("alice", 1), ("bob", 2)] {
        let id = reminders
            .schedule_in(
                &Reminder {
                    user: user.to_string(),
                    message: format!("due after {}s", delay),
                },
                Duration::from_secs(delay),
            )
            .await?;
        println!("   Task {} for {} in {}s", id, user, delay);
    }
    println!("   Pending: {}\n", reminders.pending().await?);

    // 2. Consume in due order
    println!("2. Waiting for reminders...");
    let mut due = reminders.listen().take(3);
    while let Some(reminder) = due.next().await {
        let reminder = reminder?;
        println!("   {} -> {}", reminder.user, reminder.message);
    }

    println!("\n3. Metrics:\n{}", metrics.gather());
    Ok(())
}
