//! YAML rule file: threshold defaults and severity policy.
//!
//! ```yaml
//! thresholds:
//!   sales: { min_threshold: 2000, max_threshold: 8000, percent_change_limit: 25 }
//!   financial: { min_threshold: 0, max_threshold: 50000, percent_change_limit: 40 }
//! severity:
//!   default:
//!     below_min_critical_ratio: 0.5
//!   categories:
//!     production: { above_max: info }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use bialarm_core::{Category, RuleConfig};

use crate::defaults::builtin_thresholds;
use crate::error::{Result, RuleError};
use crate::severity::SeverityRules;

/// Parsed rule file. Both sections are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleFile {
    /// Replaces the built-in thresholds entirely when non-empty.
    pub thresholds: BTreeMap<Category, RuleConfig>,
    pub severity: SeverityRules,
}

impl RuleFile {
    /// Built-in thresholds and default severity policy.
    pub fn builtin() -> Self {
        Self {
            thresholds: builtin_thresholds(),
            severity: SeverityRules::default(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut file: RuleFile = serde_yaml::from_str(yaml)?;
        file.validate()?;
        if file.thresholds.is_empty() {
            file.thresholds = builtin_thresholds();
        }
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let file = Self::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            thresholds = file.thresholds.len(),
            severity_overrides = file.severity.categories.len(),
            "rule file loaded"
        );
        Ok(file)
    }

    /// Load `path` when given, otherwise fall back to [`RuleFile::builtin`].
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin()),
        }
    }

    fn validate(&self) -> Result<()> {
        for (category, config) in &self.thresholds {
            config.validate().map_err(|source| RuleError::Validation {
                category: category.to_string(),
                source,
            })?;
        }
        self.severity
            .validate()
            .map_err(|(category, source)| RuleError::Validation { category, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bialarm_core::{Severity, ValidationError};

    const SAMPLE: &str = r#"
thresholds:
  sales: { min_threshold: 100, max_threshold: 900, percent_change_limit: 10 }
  Financial: { min_threshold: 0, max_threshold: 50000, percent_change_limit: 40 }
severity:
  categories:
    production: { above_max: info }
"#;

    #[test]
    fn parses_thresholds_and_overrides() {
        let file = RuleFile::from_yaml(SAMPLE).unwrap();
        assert_eq!(file.thresholds.len(), 2);
        assert_eq!(
            file.thresholds[&Category::financial()].percent_change_limit,
            40.0
        );
        assert_eq!(
            file.severity.for_category(&Category::production()).above_max,
            Severity::Info
        );
        assert_eq!(file.severity.default, Default::default());
    }

    #[test]
    fn empty_file_uses_builtins() {
        let file = RuleFile::from_yaml("{}").unwrap();
        assert_eq!(file, RuleFile::builtin());
    }

    #[test]
    fn rejects_invalid_threshold() {
        let err = RuleFile::from_yaml(
            "thresholds:\n  sales: { min_threshold: 5, max_threshold: 1, percent_change_limit: 10 }\n",
        )
        .unwrap_err();
        match err {
            RuleError::Validation { category, source } => {
                assert_eq!(category, "sales");
                assert!(matches!(source, ValidationError::ThresholdOrder { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = RuleFile::from_yaml("thresholds: {}\nextra: 1\n").unwrap_err();
        assert!(matches!(err, RuleError::Parse(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = RuleFile::load_or_builtin(Some(&path)).unwrap();
        assert_eq!(file.thresholds[&Category::sales()].min_threshold, 100.0);

        let missing = RuleFile::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, RuleError::Io(_)));
    }
}
