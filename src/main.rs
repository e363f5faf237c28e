mod cli;
mod config;
mod error;
mod history;
mod legacy;
mod logging;
mod model;
mod pipeline;
mod poller;
mod tracker;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use cli::Command;
use history::History;
use legacy::database::DatabaseSource;
use legacy::trackit::TrackitClient;
use pipeline::{Migrator, Settings};
use poller::Poller;
use tracker::jira::JiraTracker;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match cli::parse_args(&args)? {
        Command::Help => {
            cli::print_help();
            Ok(())
        }
        Command::History {
            config,
            limit,
            legacy_id,
        } => cli::handle_history(&config, limit, legacy_id),
        Command::Run { config } => run(&config, None).await,
        Command::Once { config } => run(&config, Some(1)).await,
    }
}

async fn run(config_path: &Path, cycles: Option<u64>) -> Result<()> {
    let config = config::load_config(config_path)?;

    if let Err(e) = logging::init_logging(&config.log_level, config.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let source = DatabaseSource::new(&config.database);
    let tracker = JiraTracker::new(&config.jira, timeout)
        .context("Failed to build Jira client")?
        .with_upload_timeout(Duration::from_secs(config.upload_timeout_secs));
    let legacy =
        TrackitClient::new(&config.trackit, timeout).context("Failed to build Track-It! client")?;

    let migrator = Migrator::new(Settings::from(&config), &source, &tracker, &legacy)
        .with_history(History::new(config.history_file.clone()));
    let poller = Poller::new(
        migrator,
        Duration::from_secs(config.poll_interval_secs),
        config.diagnostics_file.clone(),
    );

    info!(
        project = %config.jira.project_key,
        interval_secs = config.poll_interval_secs,
        "starting migration"
    );

    if cycles == Some(1) {
        // A one-shot run reports failure through the exit code.
        poller
            .run_guarded()
            .await
            .map(|_| ())
            .map_err(|failure| anyhow::anyhow!("Migration cycle failed: {}", failure.render()))
    } else {
        poller.run(cycles).await;
        Ok(())
    }
}
