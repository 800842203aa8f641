//! Bulk ingestion from JSON-lines files.
//!
//! Rejected rows are skipped and reported; only a storage failure aborts
//! the batch.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use bialarm_core::{Category, Error, NewObservation};
use bialarm_rules::Monitor;

/// One input line: a category plus the observation fields.
#[derive(Debug, Deserialize)]
struct ImportRow {
    category: String,
    #[serde(flatten)]
    observation: NewObservation,
}

#[derive(Debug, Serialize)]
pub struct SkippedRow {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub ingested: usize,
    pub skipped: Vec<SkippedRow>,
}

pub fn import_file(monitor: &Monitor, path: &Path) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report = import_lines(monitor, &text)?;
    info!(
        file = %path.display(),
        ingested = report.ingested,
        skipped = report.skipped.len(),
        "import finished"
    );
    Ok(report)
}

pub fn import_lines(monitor: &Monitor, text: &str) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') {
            continue;
        }

        let outcome = serde_json::from_str::<ImportRow>(raw)
            .map_err(|e| e.to_string())
            .and_then(|row| {
                let category = Category::new(&row.category).map_err(|e| e.to_string())?;
                Ok((category, row.observation))
            });
        let (category, observation) = match outcome {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(line, error = %error, "skipping malformed row");
                report.skipped.push(SkippedRow { line, error });
                continue;
            }
        };

        match monitor.ingest(&category, observation) {
            Ok(_) => report.ingested += 1,
            Err(Error::Validation(e)) => {
                warn!(line, error = %e, "skipping invalid row");
                report.skipped.push(SkippedRow {
                    line,
                    error: e.to_string(),
                });
            }
            Err(e) => {
                return Err(e).with_context(|| format!("storage failed at line {line}"));
            }
        }
    }

    Ok(report)
}
