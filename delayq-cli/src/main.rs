//! Delayq CLI - Command line tool for scheduling and consuming delayed tasks

mod client;
mod commands;

use clap::{Args, Parser, Subcommand};
use delayq::StoreConfig;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "delayq")]
#[command(about = "Delayq CLI - Schedule and consume delayed tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Redis host
    #[arg(long, env = "DELAYQ_HOST", default_value = "localhost", global = true)]
    host: String,
    /// Redis port
    #[arg(long, env = "DELAYQ_PORT", default_value_t = 6379, global = true)]
    port: u16,
    /// Redis logical database
    #[arg(long, env = "DELAYQ_DB", default_value_t = 0, global = true)]
    db: u8,
    /// Bounds the reconnect delay to max_retries * 50ms (0 = 2s cap)
    #[arg(long, env = "DELAYQ_MAX_RETRIES", default_value_t = 0, global = true)]
    max_retries: u32,
    /// Redis password
    #[arg(long, env = "DELAYQ_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
}

impl ConnectionArgs {
    fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_database(self.db)
            .with_max_retries(self.max_retries);
        match &self.password {
            Some(password) => config.with_password(password.clone()),
            None => config,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule a JSON payload
    Schedule {
        /// Topic name
        #[arg(short, long)]
        topic: String,
        /// Payload as JSON
        #[arg(short, long)]
        payload: String,
        /// Deliver after this many milliseconds
        #[arg(long, conflicts_with = "at")]
        delay_ms: Option<u64>,
        /// Deliver at this epoch timestamp (milliseconds)
        #[arg(long)]
        at: Option<i64>,
    },
    /// Print due payloads as JSON lines
    Listen {
        /// Topic name
        #[arg(short, long)]
        topic: String,
        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Exit after this many payloads
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show pending task count
    Stats {
        /// Topic name
        #[arg(short, long)]
        topic: String,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let factory = client::create_factory(cli.connection.store_config()).await?;

    match cli.command {
        Commands::Schedule {
            topic,
            payload,
            delay_ms,
            at,
        } => {
            let due_at = commands::schedule::resolve_due(delay_ms, at, chrono::Utc::now())?;
            commands::schedule::run(&factory, &topic, &payload, due_at).await?;
        }
        Commands::Listen {
            topic,
            interval_ms,
            limit,
        } => {
            let interval = Duration::from_millis(interval_ms);
            commands::listen::run(&factory, &topic, interval, limit).await?;
        }
        Commands::Stats { topic } => {
            commands::stats::show(&factory, &topic).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_schedule() {
        let cli = Cli::try_parse_from([
            "delayq",
            "--port",
            "6380",
            "schedule",
            "--topic",
            "jobs",
            "--payload",
            r#"{"a":1}"#,
            "--delay-ms",
            "5000",
        ])
        .unwrap();

        let config = cli.connection.store_config();
        assert_eq!(config.port, 6380);
        assert_eq!(config.database, 0);
        match cli.command {
            Commands::Schedule {
                topic,
                delay_ms,
                at,
                ..
            } => {
                assert_eq!(topic, "jobs");
                assert_eq!(delay_ms, Some(5000));
                assert_eq!(at, None);
            }
            _ => panic!("expected schedule"),
        }
    }

    #[test]
    fn test_delay_conflicts_with_at() {
        let result = Cli::try_parse_from([
            "delayq", "schedule", "-t", "jobs", "-p", "1", "--delay-ms", "5", "--at", "10",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "delayq", "stats", "-t", "jobs", "--db", "3", "--password", "secret",
        ])
        .unwrap();
        let config = cli.connection.store_config();
        assert_eq!(config.database, 3);
        assert_eq!(config.password.as_deref(), Some("secret"));
    }
}
