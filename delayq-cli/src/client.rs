//! Scheduler factory for CLI commands
//!
//! Provides centralized connection setup.

use color_eyre::Result;
use delayq::{SchedulerFactory, StoreConfig};

/// Connect to Redis and create a scheduler factory
///
/// # Example
/// ```no_run
/// # async fn example() -> color_eyre::Result<()> {
/// let factory = create_factory(delayq::StoreConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn create_factory(config: StoreConfig) -> Result<SchedulerFactory> {
    tracing::debug!("Connecting to {}", config.url());
    SchedulerFactory::connect(config)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e))
}
