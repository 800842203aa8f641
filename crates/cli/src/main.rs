mod cli;
mod commands;
mod import;

use anyhow::{Context, Result};
use clap::Parser;

use bialarm_core::config::{load_dotenv, Config};
use bialarm_rules::{Monitor, RuleFile};
use bialarm_storage::{open_backend, AlertStoreConfig};

use crate::cli::CliArgs;

/// Upper bound for the resolved-alert retention period (100 years).
const MAX_RETENTION_DAYS: u64 = 36_500;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries command output only.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let mut config = Config::for_profile(&args.profile);
    if args.in_memory {
        config.storage.backend = "memory".to_string();
    }

    let monitor = build_monitor(&config)?;
    commands::dispatch(&monitor, &config, args.command).await
}

fn build_monitor(config: &Config) -> Result<Monitor> {
    let backend = open_backend(&config.storage).context("failed to open storage backend")?;
    let rules = RuleFile::load_or_builtin(config.rules.rules_file.as_deref())
        .context("failed to load rule file")?;
    let retention_days = config.alerts.resolved_retention_days.min(MAX_RETENTION_DAYS) as i64;

    Monitor::builder(backend)
        .rules(rules)
        .alert_config(AlertStoreConfig::from(&config.alerts))
        .resolved_retention(chrono::Duration::days(retention_days))
        .build()
        .context("failed to open bialarm state")
}
