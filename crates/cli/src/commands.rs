//! Subcommand handlers. Results are printed to stdout as JSON; logs go to
//! stderr.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use bialarm_core::config::{nonzero_secs, DEFAULT_DEMO_INTERVAL_SECS};
use bialarm_core::{Config, NewObservation, RuleConfig};
use bialarm_rules::{Monitor, ScanError, ScanOutcome, ScanSchedule};
use bialarm_storage::AlertQuery;

use crate::cli::{AlertCommand, Command, ConfigCommand, IngestArgs, RunArgs};
use crate::import::import_file;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn dispatch(monitor: &Monitor, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Ingest(args) => ingest(monitor, args),
        Command::Scan => scan(monitor),
        Command::Alerts { command } => alerts(monitor, command),
        Command::Config { command } => rules_config(monitor, config, command),
        Command::Run(args) => run(monitor, config, args).await,
    }
}

fn ingest(monitor: &Monitor, args: IngestArgs) -> Result<()> {
    if let Some(path) = &args.file {
        let report = import_file(monitor, path)?;
        return print_json(&report);
    }

    let (Some(category), Some(date), Some(value)) = (args.category, args.date, args.value) else {
        bail!("--category, --date and --value are required without --file");
    };
    let observation = args
        .metadata
        .into_iter()
        .fold(NewObservation::new(date, value), |obs, (k, v)| obs.with_metadata(k, v));
    let stored = monitor
        .ingest(&category, observation)
        .context("observation rejected")?;
    print_json(&stored)
}

fn scan(monitor: &Monitor) -> Result<()> {
    let alerts = match monitor.run_scan() {
        Ok(ScanOutcome::Completed(report)) => report.alerts,
        Ok(ScanOutcome::Coalesced) => Vec::new(),
        Err(e @ ScanError::Commit { .. }) => {
            warn!(error = %e, "retrying alert commit");
            let (mut committed, drafts) = e.into_parts();
            committed.extend(
                monitor
                    .commit_alerts(drafts)
                    .context("failed to commit scan results")?,
            );
            committed
        }
    };
    info!(alerts = alerts.len(), "scan finished");
    print_json(&alerts)
}

fn alerts(monitor: &Monitor, command: AlertCommand) -> Result<()> {
    match command {
        AlertCommand::List {
            unread,
            unresolved,
            category,
            severity,
            limit,
        } => {
            let query = AlertQuery {
                unread_only: unread,
                unresolved_only: unresolved,
                category,
                severity,
                limit,
            };
            print_json(&monitor.alerts(&query))
        }
        AlertCommand::Show { id } => print_json(&monitor.alert(id)?),
        AlertCommand::Read { id } => {
            report_found(id, monitor.mark_read(id)?);
            Ok(())
        }
        AlertCommand::Resolve { id } => {
            report_found(id, monitor.mark_resolved(id)?);
            Ok(())
        }
        AlertCommand::ReadAll => {
            let changed = monitor.mark_all_read()?;
            print_json(&serde_json::json!({ "marked_read": changed }))
        }
        AlertCommand::Delete { id } => {
            let deleted = monitor.delete_alert(id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
        AlertCommand::Purge => {
            let purged = monitor.purge_resolved()?;
            print_json(&serde_json::json!({ "purged": purged }))
        }
        AlertCommand::Counts => print_json(&monitor.counts()),
    }
}

fn report_found(id: uuid::Uuid, found: bool) {
    if !found {
        warn!(%id, "no such alert, nothing changed");
    }
}

fn rules_config(monitor: &Monitor, config: &Config, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { category: Some(category) } => match monitor.get_config(&category) {
            Some(rule) => print_json(&rule),
            None => bail!("no rule config for '{category}'"),
        },
        ConfigCommand::Show { category: None } => print_json(&monitor.configs()),
        ConfigCommand::Set {
            category,
            min,
            max,
            change_limit,
        } => {
            let rule = RuleConfig {
                min_threshold: min,
                max_threshold: max,
                percent_change_limit: change_limit,
            };
            monitor
                .set_config(&category, rule)
                .context("rule config rejected")?;
            print_json(&rule)
        }
        ConfigCommand::Reset => {
            monitor.reset_config()?;
            print_json(&monitor.configs())
        }
        ConfigCommand::Env => print_json(&config.redacted_summary()),
    }
}

fn schedule_for(config: &Config, args: &RunArgs) -> ScanSchedule {
    let pick = |flag: Option<u64>, configured: Option<Duration>| match flag {
        Some(secs) => nonzero_secs(Some(secs)),
        None => configured,
    };
    let mut demo = pick(args.demo_interval_secs, config.scan.demo_interval());
    if args.demo && args.demo_interval_secs.is_none() && demo.is_none() {
        demo = nonzero_secs(Some(DEFAULT_DEMO_INTERVAL_SECS));
    }
    ScanSchedule {
        demo,
        production: pick(args.production_interval_secs, config.scan.production_interval()),
    }
}

async fn run(monitor: &Monitor, config: &Config, args: RunArgs) -> Result<()> {
    config.log_summary();

    let purged = monitor.purge_resolved()?;
    if purged > 0 {
        info!(purged, "purged old resolved alerts");
    }

    let schedule = schedule_for(config, &args);
    if schedule.is_empty() {
        warn!("no scan schedule enabled, waiting for Ctrl-C only");
    }

    let mut events = monitor.subscribe();
    let notifier = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(alert) => info!(
                    id = %alert.id,
                    category = %alert.category,
                    kind = %alert.kind,
                    severity = %alert.severity,
                    "{}",
                    alert.message
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "alert notifications lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    monitor.start_scheduler(schedule).await;
    info!("bialarm running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("shutdown requested");
    monitor.shutdown().await;
    notifier.abort();
    info!(
        scans = monitor.scan_metrics().scans_completed,
        "bialarm stopped"
    );
    Ok(())
}
