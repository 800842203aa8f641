use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use bialarm_core::{Category, Severity};

/// Business-metric anomaly alerting.
///
/// Records daily observations per category, checks them against
/// per-category thresholds and keeps a bounded alert history.
#[derive(Parser, Debug)]
#[command(name = "bialarm", version, about)]
pub struct CliArgs {
    /// Config profile; keys are read as {PROFILE}_{KEY} before {KEY}.
    #[arg(long, env = "BIALARM_PROFILE", default_value = "")]
    pub profile: String,

    /// Keep all state in memory for this invocation.
    #[arg(long)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Record one observation, or bulk-import a JSON-lines file
    Ingest(IngestArgs),
    /// Run detection across all configured categories now
    Scan,
    /// Query and manage alerts
    Alerts {
        #[command(subcommand)]
        command: AlertCommand,
    },
    /// Show or change rule thresholds
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Run the scan timers until Ctrl-C
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Category of the observation (e.g. sales, traffic)
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    pub category: Option<Category>,

    /// Calendar date, YYYY-MM-DD
    #[arg(long, requires = "category")]
    pub date: Option<String>,

    /// Observed value
    #[arg(long, requires = "category", allow_hyphen_values = true)]
    pub value: Option<f64>,

    /// Metadata entry as key=value (repeatable), e.g. --meta defects=12
    #[arg(long = "meta", value_parser = parse_key_val)]
    pub metadata: Vec<(String, String)>,

    /// JSON-lines file, one {"category", "date", "value", "metadata"} object per line
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum AlertCommand {
    /// List alerts, most recent first
    List {
        #[arg(long)]
        unread: bool,
        #[arg(long)]
        unresolved: bool,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        severity: Option<Severity>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one alert
    Show { id: Uuid },
    /// Mark an alert read
    Read { id: Uuid },
    /// Mark an alert resolved
    Resolve { id: Uuid },
    /// Mark every alert read
    ReadAll,
    /// Delete an alert
    Delete { id: Uuid },
    /// Drop resolved alerts older than the retention period
    Purge,
    /// Alert counts by severity and state
    Counts,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show thresholds for one category, or all
    Show { category: Option<Category> },
    /// Set thresholds for a category
    Set {
        category: Category,
        #[arg(long, allow_hyphen_values = true)]
        min: f64,
        #[arg(long, allow_hyphen_values = true)]
        max: f64,
        /// Maximum tolerated step change, in percent
        #[arg(long)]
        change_limit: f64,
    },
    /// Restore default thresholds
    Reset,
    /// Show the effective environment configuration
    Env,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Enable the demo cadence at its default period when none is configured
    #[arg(long)]
    pub demo: bool,

    /// Demo cadence in seconds (overrides BIALARM_DEMO_INTERVAL_SECS; 0 disables)
    #[arg(long)]
    pub demo_interval_secs: Option<u64>,

    /// Production cadence in seconds (overrides BIALARM_PRODUCTION_INTERVAL_SECS; 0 disables)
    #[arg(long)]
    pub production_interval_secs: Option<u64>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}
