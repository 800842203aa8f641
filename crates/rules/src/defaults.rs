//! Built-in thresholds restored by a reset when no rule file is configured.

use std::collections::BTreeMap;

use bialarm_core::{Category, RuleConfig};

/// Default thresholds per category. `financial` is recognised but has no
/// default, so it is skipped until configured.
pub fn builtin_thresholds() -> BTreeMap<Category, RuleConfig> {
    BTreeMap::from([
        (
            Category::sales(),
            RuleConfig {
                min_threshold: 2000.0,
                max_threshold: 8000.0,
                percent_change_limit: 25.0,
            },
        ),
        (
            Category::traffic(),
            RuleConfig {
                min_threshold: 1000.0,
                max_threshold: 6000.0,
                percent_change_limit: 30.0,
            },
        ),
        (
            Category::production(),
            RuleConfig {
                min_threshold: 1000.0,
                max_threshold: 3000.0,
                percent_change_limit: 20.0,
            },
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_thresholds_are_valid() {
        let defaults = builtin_thresholds();
        assert_eq!(defaults.len(), 3);
        assert!(defaults.values().all(|c| c.validate().is_ok()));
        assert!(!defaults.contains_key(&Category::financial()));
    }
}
