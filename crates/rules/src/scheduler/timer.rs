//! Periodic scan triggers on tokio intervals.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use bialarm_core::config::MAX_INTERVAL_SECS;
use bialarm_storage::SeriesStore;

use super::core::{ScanOutcome, ScanScheduler};

/// The two named cadences. `None` disables a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSchedule {
    pub demo: Option<Duration>,
    pub production: Option<Duration>,
}

impl ScanSchedule {
    pub fn is_empty(&self) -> bool {
        self.demo.is_none() && self.production.is_none()
    }
}

/// Running timer tasks. Dropping the handle also ends the timers, but only
/// [`stop`](Self::stop) waits for them.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signal every timer to exit and wait for them. A scan already in
    /// flight runs to completion first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "scan timer task ended abnormally");
            }
        }
        info!("scan timers stopped");
    }

    /// Number of timers started.
    pub fn timers(&self) -> usize {
        self.tasks.len()
    }

    /// Number of timer tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }
}

impl ScanScheduler {
    /// Spawn one interval task per enabled schedule.
    ///
    /// Ticks are skipped while `series` holds no observations. The first
    /// scan happens one full period after start. Periods are capped at
    /// [`MAX_INTERVAL_SECS`]. Must be called inside a tokio runtime.
    pub fn start(
        self: &Arc<Self>,
        series: Arc<SeriesStore>,
        schedule: ScanSchedule,
    ) -> SchedulerHandle {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        for (name, period) in [("demo", schedule.demo), ("production", schedule.production)] {
            let Some(period) = period.filter(|p| !p.is_zero()) else {
                continue;
            };
            let period = period.min(Duration::from_secs(MAX_INTERVAL_SECS));
            info!(schedule = name, period_secs = period.as_secs_f64(), "scan timer started");
            tasks.push(tokio::spawn(run_timer(
                name,
                period,
                Arc::clone(self),
                Arc::clone(&series),
                shutdown.subscribe(),
            )));
        }

        SchedulerHandle { shutdown, tasks }
    }
}

async fn run_timer(
    name: &'static str,
    period: Duration,
    scheduler: Arc<ScanScheduler>,
    series: Arc<SeriesStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        if series.is_empty() {
            debug!(schedule = name, "scan tick skipped, no data");
            continue;
        }

        // Detection and persistence are synchronous; keep them off the runtime.
        let scheduler = Arc::clone(&scheduler);
        match tokio::task::spawn_blocking(move || scheduler.run_scan()).await {
            Ok(Ok(ScanOutcome::Completed(report))) => {
                debug!(schedule = name, alerts = report.alerts.len(), "timed scan finished");
            }
            Ok(Ok(ScanOutcome::Coalesced)) => {
                debug!(schedule = name, "timed scan coalesced");
            }
            Ok(Err(e)) => {
                warn!(schedule = name, error = %e, "timed scan failed");
            }
            Err(e) => {
                warn!(schedule = name, error = %e, "timed scan task panicked");
            }
        }
    }
    debug!(schedule = name, "scan timer exiting");
}
