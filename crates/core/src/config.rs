use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64_opt(profile: &str, key: &str) -> Option<u64> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

/// Longest accepted scan interval or suppression window (one year).
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Treat a zero interval as "disabled" and cap it at [`MAX_INTERVAL_SECS`].
pub fn nonzero_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0)
        .map(|s| Duration::from_secs(s.min(MAX_INTERVAL_SECS)))
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub scan: ScanConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `BIALARM_PROFILE`. When set (e.g. `DEMO`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("BIALARM_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            alerts: AlertConfig::from_env_profiled(p),
            scan: ScanConfig::from_env_profiled(p),
            rules: RulesConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:  backend={}, data_dir={}",
            self.storage.backend,
            self.storage.data_dir.display()
        );
        tracing::info!(
            "  alerts:   max={}, suppression={:?}s, resolved_retention={}d",
            self.alerts.max_alerts,
            self.alerts.suppression_window_secs,
            self.alerts.resolved_retention_days
        );
        tracing::info!(
            "  scan:     demo={:?}s, production={:?}s",
            self.scan.demo_interval_secs,
            self.scan.production_interval_secs
        );
        tracing::info!(
            "  rules:    file={}",
            self.rules
                .rules_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in defaults)".to_string())
        );
    }

    /// Return a view safe for reporting.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "storage": { "backend": self.storage.backend, "data_dir": self.storage.data_dir },
            "alerts": {
                "max_alerts": self.alerts.max_alerts,
                "suppression_window_secs": self.alerts.suppression_window_secs,
                "resolved_retention_days": self.alerts.resolved_retention_days,
            },
            "scan": {
                "demo_interval_secs": self.scan.demo_interval_secs,
                "production_interval_secs": self.scan.production_interval_secs,
            },
            "rules": { "rules_file": self.rules.rules_file },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: String::new(),
            storage: StorageConfig::default(),
            alerts: AlertConfig::default(),
            scan: ScanConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "file"
    pub backend: String,
    pub data_dir: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "BIALARM_STORAGE", "file").to_lowercase(),
            data_dir: PathBuf::from(profiled_env_or(p, "BIALARM_DATA_DIR", "data")),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.backend == "memory"
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            data_dir: PathBuf::from("data"),
        }
    }
}

// ── Alerts ────────────────────────────────────────────────────

pub const DEFAULT_MAX_ALERTS: usize = 100;
pub const DEFAULT_RESOLVED_RETENTION_DAYS: u64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Retention cap; oldest alerts are evicted beyond this.
    pub max_alerts: usize,
    /// Drop repeat `(category, kind)` alerts within this window. Unset = never.
    pub suppression_window_secs: Option<u64>,
    /// Age after which resolved alerts are purged.
    pub resolved_retention_days: u64,
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_alerts: profiled_env_u64(p, "BIALARM_MAX_ALERTS", DEFAULT_MAX_ALERTS as u64) as usize,
            suppression_window_secs: profiled_env_u64_opt(p, "BIALARM_SUPPRESSION_SECS")
                .filter(|s| *s > 0),
            resolved_retention_days: profiled_env_u64(
                p,
                "BIALARM_RESOLVED_RETENTION_DAYS",
                DEFAULT_RESOLVED_RETENTION_DAYS,
            ),
        }
    }

    pub fn suppression_window(&self) -> Option<Duration> {
        nonzero_secs(self.suppression_window_secs)
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_alerts: DEFAULT_MAX_ALERTS,
            suppression_window_secs: None,
            resolved_retention_days: DEFAULT_RESOLVED_RETENTION_DAYS,
        }
    }
}

// ── Scan cadence ──────────────────────────────────────────────

/// Fast cadence used for demos.
pub const DEFAULT_DEMO_INTERVAL_SECS: u64 = 30;
/// Regular cadence.
pub const DEFAULT_PRODUCTION_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Demo schedule; disabled unless set.
    pub demo_interval_secs: Option<u64>,
    /// Production schedule; 0 disables.
    pub production_interval_secs: Option<u64>,
}

impl ScanConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            demo_interval_secs: profiled_env_u64_opt(p, "BIALARM_DEMO_INTERVAL_SECS"),
            production_interval_secs: Some(profiled_env_u64(
                p,
                "BIALARM_PRODUCTION_INTERVAL_SECS",
                DEFAULT_PRODUCTION_INTERVAL_SECS,
            )),
        }
    }

    pub fn demo_interval(&self) -> Option<Duration> {
        nonzero_secs(self.demo_interval_secs)
    }

    pub fn production_interval(&self) -> Option<Duration> {
        nonzero_secs(self.production_interval_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            demo_interval_secs: None,
            production_interval_secs: Some(DEFAULT_PRODUCTION_INTERVAL_SECS),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Optional YAML file overriding built-in thresholds and severity policy.
    pub rules_file: Option<PathBuf>,
}

impl RulesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            rules_file: profiled_env_opt(p, "BIALARM_RULES_FILE").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.alerts.max_alerts, 100);
        assert_eq!(c.alerts.suppression_window(), None);
        assert_eq!(c.alerts.resolved_retention_days, 7);
        assert_eq!(c.scan.demo_interval(), None);
        assert_eq!(c.scan.production_interval(), Some(Duration::from_secs(300)));
        assert!(!c.storage.is_in_memory());
        assert_eq!(c.profile_label(), "default");
    }

    #[test]
    fn zero_interval_disables_schedule() {
        let scan = ScanConfig {
            demo_interval_secs: Some(0),
            production_interval_secs: Some(0),
        };
        assert_eq!(scan.demo_interval(), None);
        assert_eq!(scan.production_interval(), None);
    }

    #[test]
    fn oversized_intervals_are_capped() {
        let scan = ScanConfig {
            demo_interval_secs: Some(u64::MAX),
            production_interval_secs: Some(MAX_INTERVAL_SECS + 1),
        };
        let cap = Some(Duration::from_secs(MAX_INTERVAL_SECS));
        assert_eq!(scan.demo_interval(), cap);
        assert_eq!(scan.production_interval(), cap);

        let alerts = AlertConfig {
            suppression_window_secs: Some(u64::MAX),
            ..AlertConfig::default()
        };
        assert_eq!(alerts.suppression_window(), cap);
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        // Unique key names keep this test independent of the real environment.
        env::set_var("BIALARMTEST_BIALARM_MAX_ALERTS", "42");
        let c = Config::for_profile("bialarmtest");
        assert_eq!(c.profile, "BIALARMTEST");
        assert_eq!(c.alerts.max_alerts, 42);
        env::remove_var("BIALARMTEST_BIALARM_MAX_ALERTS");
    }

    #[test]
    fn redacted_summary_shape() {
        let v = Config::default().redacted_summary();
        assert_eq!(v["alerts"]["max_alerts"], 100);
        assert_eq!(v["storage"]["backend"], "file");
    }
}
