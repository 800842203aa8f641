//! Detection Engine: turns the latest observation pair of a category into
//! alert drafts.
//!
//! Evaluation reads only the Series Store and Rule Configuration as they are
//! at call time. Nothing is remembered between calls and categories never
//! influence each other.

mod checks;


use std::sync::Arc;

use tracing::debug;

use bialarm_core::{AlertDraft, Category, SharedClock};
use bialarm_storage::SeriesStore;

use crate::config_store::RuleConfigStore;
use crate::severity::SeverityRules;

pub use checks::percent_change;

pub struct DetectionEngine {
    series: Arc<SeriesStore>,
    rules: Arc<RuleConfigStore>,
    severity: SeverityRules,
    clock: SharedClock,
}

impl DetectionEngine {
    pub fn new(
        series: Arc<SeriesStore>,
        rules: Arc<RuleConfigStore>,
        severity: SeverityRules,
        clock: SharedClock,
    ) -> Self {
        Self {
            series,
            rules,
            severity,
            clock,
        }
    }

    /// Drafts for one category, possibly empty.
    ///
    /// Unconfigured categories and empty series yield nothing. A single
    /// observation runs only the threshold and defect-rate checks.
    pub fn evaluate(&self, category: &Category) -> Vec<AlertDraft> {
        let Some(config) = self.rules.get(category) else {
            debug!(category = %category, "no rule config, skipping");
            return Vec::new();
        };
        let (current, previous) = self.series.latest_two(category);
        let Some(current) = current else {
            return Vec::new();
        };

        let policy = self.severity.for_category(category);
        let now = self.clock.now();
        let mut drafts = Vec::new();

        drafts.extend(checks::thresholds(&current, &config, policy, now));
        if let Some(previous) = &previous {
            drafts.extend(checks::step_change(&current, previous, &config, policy, now));
        }
        drafts.extend(checks::defect_rate(&current, now));

        for d in &drafts {
            debug!(
                category = %category,
                kind = %d.kind,
                severity = %d.severity,
                value = d.value,
                "alert emitted"
            );
        }
        drafts
    }

    /// Evaluate every configured category, in category order.
    pub fn evaluate_all(&self) -> Vec<AlertDraft> {
        self.rules
            .all()
            .keys()
            .flat_map(|category| self.evaluate(category))
            .collect()
    }
}
