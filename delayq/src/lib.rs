//! # Delayq
//!
//! Delayq is a delayed task scheduler backed by Redis.
//!
//! ## Features
//!
//! - Schedule serializable payloads for delivery at a future instant
//! - Earliest-due-first delivery through an async [`Stream`](futures::Stream)
//! - Topics isolated by key namespace
//! - Delivery pauses while Redis is unreachable and resumes on reconnect
//! - Prometheus metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use delayq::{SchedulerFactory, StoreConfig};
//! use futures::StreamExt;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Reminder {
//!     user_id: u64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let factory = SchedulerFactory::connect(StoreConfig::default()).await?;
//!     let reminders = factory.scheduler::<Reminder>("reminders")?;
//!
//!     // Producer side
//!     reminders
//!         .schedule_in(&Reminder { user_id: 42 }, Duration::from_secs(30))
//!         .await?;
//!
//!     // Consumer side
//!     let mut due = reminders.listen();
//!     while let Some(reminder) = due.next().await {
//!         println!("remind user {}", reminder?.user_id);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Public module exports
pub mod codec;
pub mod config;
pub mod error;

// Connection state
pub mod connection;

// Scheduler
pub mod scheduler;

// Storage layer
pub mod storage;

// Observability
pub mod observability;

// Re-export common types
pub use codec::{JsonCodec, PayloadCodec};
pub use config::{SchedulerOptions, StoreConfig};
pub use connection::{ConnectionState, LinkState, LinkStatus};
pub use error::{Error, Result};
pub use observability::SchedulerMetrics;
pub use scheduler::{
    SchedulerFactory, SchedulerFactoryBuilder, Subscription, SubscriptionHandle, TaskId,
    TaskScheduler,
};
pub use storage::{MemoryStore, RedisStore, Store};
