//! Flowwatch CLI
//!
//! Terminal front-end for a workflow server: lists and edits workflows,
//! launches them and follows their logs live while they run.

mod commands;
mod config;
mod id_resolver;
mod render;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use flowwatch_monitor::MonitorConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowwatch")]
#[command(about = "Track remote workflows from the terminal", long_about = None)]
struct Cli {
    /// Workflow server URL
    #[arg(long, env = "FLOWWATCH_SERVER_URL", default_value = "http://localhost:8080")]
    server_url: String,

    /// Milliseconds between two polls of a running workflow
    #[arg(long, env = "FLOWWATCH_POLL_INTERVAL_MS", default_value_t = 2_000)]
    poll_interval_ms: u64,

    /// Milliseconds a notification stays on screen
    #[arg(long, env = "FLOWWATCH_NOTIFICATION_LIFETIME_MS", default_value_t = 10_000)]
    notification_lifetime_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            server_url: self.server_url.clone(),
            monitor: MonitorConfig::new(
                Duration::from_millis(self.poll_interval_ms),
                Duration::from_millis(self.notification_lifetime_ms),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with rendered output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowwatch=info,flowwatch_monitor=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = cli.config();
    config.validate()?;
    tracing::debug!(server_url = %config.server_url, "Configuration loaded");

    handle_command(cli.command, &config).await
}
