use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};

use bialarm_core::{Category, ManualClock, NewObservation, PersistenceError};
use bialarm_storage::{
    AlertQuery, AlertStore, AlertStoreConfig, KeyValueStore, MemoryBackend, SeriesStore,
};

use super::*;
use crate::config_store::RuleConfigStore;
use crate::defaults::builtin_thresholds;
use crate::error::ScanError;
use crate::evaluator::DetectionEngine;
use crate::severity::SeverityRules;

struct Fixture {
    series: Arc<SeriesStore>,
    alerts: Arc<AlertStore>,
    scheduler: Arc<ScanScheduler>,
}

fn fixture_on(alert_backend: Arc<dyn KeyValueStore>, max_alerts: usize) -> Fixture {
    let backend = Arc::new(MemoryBackend::new());
    let clock: bialarm_core::SharedClock =
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
    let series = Arc::new(SeriesStore::open(backend.clone()).unwrap());
    let rules = Arc::new(RuleConfigStore::open(backend, builtin_thresholds()).unwrap());
    let alerts = Arc::new(
        AlertStore::open(
            alert_backend,
            clock.clone(),
            AlertStoreConfig {
                max_alerts,
                suppression_window: None,
            },
        )
        .unwrap(),
    );
    let engine = Arc::new(DetectionEngine::new(
        series.clone(),
        rules,
        SeverityRules::default(),
        clock.clone(),
    ));
    let scheduler = Arc::new(ScanScheduler::new(engine, alerts.clone(), clock));
    Fixture {
        series,
        alerts,
        scheduler,
    }
}

fn fixture() -> Fixture {
    fixture_on(Arc::new(MemoryBackend::new()), 100)
}

impl Fixture {
    /// One below-min sales reading: every scan emits exactly one alert.
    fn seed(&self) {
        self.series
            .append(&Category::sales(), NewObservation::new("2024-01-01", 10.0))
            .unwrap();
    }
}

#[test]
fn run_scan_commits_alerts_and_returns_to_idle() {
    let f = fixture();
    f.seed();

    let outcome = f.scheduler.run_scan().unwrap();
    let ScanOutcome::Completed(report) = outcome else {
        panic!("expected a completed scan");
    };
    assert_eq!(report.scans, 1);
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(f.alerts.len(), 1);
    assert_eq!(f.scheduler.phase(), ScanPhase::Idle);

    let metrics = f.scheduler.metrics();
    assert_eq!(metrics.scans_completed, 1);
    assert_eq!(metrics.alerts_emitted, 1);
    assert_eq!(f.scheduler.last_scan_at(), Some(report.started_at));
}

#[test]
fn repeated_scans_append_fresh_alerts() {
    let f = fixture();
    f.seed();
    f.scheduler.run_scan().unwrap();
    f.scheduler.run_scan().unwrap();
    assert_eq!(f.alerts.len(), 2);
}

#[test]
fn scan_without_data_commits_nothing() {
    let f = fixture();
    let outcome = f.scheduler.run_scan().unwrap();
    assert!(outcome.alerts().is_empty());
    assert!(f.alerts.is_empty());
    assert_eq!(f.scheduler.metrics().scans_completed, 1);
}

#[test]
fn rapid_scans_stay_within_cap() {
    let f = fixture_on(Arc::new(MemoryBackend::new()), 3);
    f.seed();
    for _ in 0..10 {
        f.scheduler.run_scan().unwrap();
    }
    assert_eq!(f.alerts.len(), 3);
}

/// Alert backend whose first write can be held open by the test. With
/// `fail_later`, every write after the first one fails.
struct GatedBackend {
    inner: MemoryBackend,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    gated: std::sync::atomic::AtomicBool,
    fail_later: bool,
}

impl GatedBackend {
    fn new(fail_later: bool) -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let backend = Arc::new(GatedBackend {
            inner: MemoryBackend::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
            gated: true.into(),
            fail_later,
        });
        (backend, entered_rx, release_tx)
    }
}

impl KeyValueStore for GatedBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        if self.gated.swap(false, std::sync::atomic::Ordering::SeqCst) {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.release.lock().unwrap().recv();
        } else if self.fail_later {
            return Err(PersistenceError::Backend {
                key: key.to_string(),
                message: "down".to_string(),
            });
        }
        self.inner.set(key, value)
    }

    fn name(&self) -> &str {
        "gated"
    }
}

#[test]
fn request_during_scan_coalesces_into_one_trailing_scan() {
    let (backend, entered_rx, release_tx) = GatedBackend::new(false);
    let f = fixture_on(backend, 100);
    f.seed();

    let scheduler = f.scheduler.clone();
    let first = std::thread::spawn(move || scheduler.run_scan());

    // First scan is now blocked inside its commit.
    entered_rx.recv().unwrap();
    assert_eq!(f.scheduler.phase(), ScanPhase::Scanning);

    // Two requests while scanning fold into a single trailing scan.
    assert!(matches!(f.scheduler.run_scan().unwrap(), ScanOutcome::Coalesced));
    assert!(matches!(f.scheduler.run_scan().unwrap(), ScanOutcome::Coalesced));

    release_tx.send(()).unwrap();
    let outcome = first.join().unwrap().unwrap();
    let ScanOutcome::Completed(report) = outcome else {
        panic!("first caller should own the scan");
    };
    assert_eq!(report.scans, 2);
    assert_eq!(report.alerts.len(), 2);
    assert_eq!(f.alerts.len(), 2);
    assert_eq!(f.scheduler.phase(), ScanPhase::Idle);

    let metrics = f.scheduler.metrics();
    assert_eq!(metrics.coalesced_requests, 2);
    assert_eq!(metrics.scans_completed, 2);
}

#[test]
fn failed_trailing_scan_reports_alerts_already_committed() {
    let (backend, entered_rx, release_tx) = GatedBackend::new(true);
    let f = fixture_on(backend, 100);
    f.seed();

    let scheduler = f.scheduler.clone();
    let first = std::thread::spawn(move || scheduler.run_scan());
    entered_rx.recv().unwrap();
    assert!(matches!(f.scheduler.run_scan().unwrap(), ScanOutcome::Coalesced));
    release_tx.send(()).unwrap();

    let err = first.join().unwrap().unwrap_err();
    assert_eq!(f.alerts.len(), 1);
    assert_eq!(err.committed().len(), 1);
    assert_eq!(err.committed()[0].id, f.alerts.query(&AlertQuery::all())[0].id);
    assert!(err.to_string().contains("1 already committed"));

    let (committed, pending) = err.into_parts();
    assert_eq!(committed.len(), 1);
    assert_eq!(pending.len(), 1);
    assert_eq!(f.scheduler.phase(), ScanPhase::Idle);
    assert_eq!(f.scheduler.metrics().scans_completed, 1);
    assert_eq!(f.scheduler.metrics().scans_failed, 1);
}

struct FailingBackend;

impl KeyValueStore for FailingBackend {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(None)
    }

    fn set(&self, key: &str, _value: &[u8]) -> Result<(), PersistenceError> {
        Err(PersistenceError::Backend {
            key: key.to_string(),
            message: "unavailable".to_string(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[test]
fn failed_commit_returns_drafts_and_leaves_store_untouched() {
    let f = fixture_on(Arc::new(FailingBackend), 100);
    f.seed();

    let err = f.scheduler.run_scan().unwrap_err();
    assert!(err.to_string().contains("1 alert(s)"));
    let ScanError::Commit { alerts, .. } = err;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, Category::sales());

    assert!(f.alerts.query(&AlertQuery::all()).is_empty());
    assert_eq!(f.scheduler.phase(), ScanPhase::Idle);
    assert_eq!(f.scheduler.metrics().scans_failed, 1);
    assert!(f.scheduler.last_scan_at().is_none());
}

// ── Timers ───────────────────────────────────────────────────

async fn wait_for_scans(scheduler: &ScanScheduler, at_least: u64) {
    for _ in 0..100 {
        if scheduler.metrics().scans_completed >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected at least {at_least} scans");
}

#[tokio::test(start_paused = true)]
async fn production_timer_scans_when_data_exists() {
    let f = fixture();
    f.seed();
    let handle = f.scheduler.start(
        f.series.clone(),
        ScanSchedule {
            demo: None,
            production: Some(Duration::from_secs(300)),
        },
    );
    assert_eq!(handle.timers(), 1);

    tokio::time::sleep(Duration::from_secs(301)).await;
    wait_for_scans(&f.scheduler, 1).await;

    handle.stop().await;
    assert!(f.alerts.len() >= 1);
}

#[tokio::test(start_paused = true)]
async fn timer_skips_ticks_without_data() {
    let f = fixture();
    let handle = f.scheduler.start(
        f.series.clone(),
        ScanSchedule {
            demo: Some(Duration::from_secs(30)),
            production: Some(Duration::from_secs(300)),
        },
    );
    assert_eq!(handle.timers(), 2);

    tokio::time::sleep(Duration::from_secs(650)).await;
    assert_eq!(f.scheduler.metrics().scans_completed, 0);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_halts_further_scans() {
    let f = fixture();
    f.seed();
    let handle = f.scheduler.start(
        f.series.clone(),
        ScanSchedule {
            demo: Some(Duration::from_secs(30)),
            production: None,
        },
    );
    tokio::time::sleep(Duration::from_secs(31)).await;
    wait_for_scans(&f.scheduler, 1).await;
    handle.stop().await;

    let after_stop = f.scheduler.metrics().scans_completed;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(f.scheduler.metrics().scans_completed, after_stop);
}

#[tokio::test(start_paused = true)]
async fn oversized_period_is_capped_and_keeps_running() {
    let f = fixture();
    f.seed();
    let handle = f.scheduler.start(
        f.series.clone(),
        ScanSchedule {
            demo: None,
            production: Some(Duration::MAX),
        },
    );
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.running(), 1);
    assert_eq!(f.scheduler.metrics().scans_completed, 0);
    handle.stop().await;
}

#[tokio::test]
async fn empty_schedule_spawns_nothing() {
    let f = fixture();
    let handle = f.scheduler.start(f.series.clone(), ScanSchedule::default());
    assert!(ScanSchedule::default().is_empty());
    assert_eq!(handle.timers(), 0);
    handle.stop().await;
}
