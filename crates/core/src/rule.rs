use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Thresholds governing anomaly detection for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// Maximum tolerated step-to-step change, in percent.
    pub percent_change_limit: f64,
}

impl RuleConfig {
    /// Build a validated config.
    pub fn new(
        min_threshold: f64,
        max_threshold: f64,
        percent_change_limit: f64,
    ) -> Result<Self, ValidationError> {
        let config = Self {
            min_threshold,
            max_threshold,
            percent_change_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("min_threshold", self.min_threshold),
            ("max_threshold", self.max_threshold),
            ("percent_change_limit", self.percent_change_limit),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteThreshold { field, value });
            }
        }
        if self.min_threshold > self.max_threshold {
            return Err(ValidationError::ThresholdOrder {
                min: self.min_threshold,
                max: self.max_threshold,
            });
        }
        if self.percent_change_limit <= 0.0 {
            return Err(ValidationError::NonPositiveChangeLimit(self.percent_change_limit));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_equal_bounds() {
        assert!(RuleConfig::new(5.0, 5.0, 1.0).is_ok());
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert_eq!(
            RuleConfig::new(10.0, 5.0, 20.0),
            Err(ValidationError::ThresholdOrder { min: 10.0, max: 5.0 })
        );
    }

    #[test]
    fn rejects_non_positive_limit() {
        assert_eq!(
            RuleConfig::new(1.0, 5.0, 0.0),
            Err(ValidationError::NonPositiveChangeLimit(0.0))
        );
        assert!(RuleConfig::new(1.0, 5.0, -3.0).is_err());
    }

    #[test]
    fn rejects_nan_threshold() {
        let err = RuleConfig::new(f64::NAN, 5.0, 10.0).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonFiniteThreshold { field: "min_threshold", .. }
        ));
    }

    #[test]
    fn yaml_shape_is_snake_case() {
        let json = serde_json::to_value(RuleConfig::new(1.0, 2.0, 3.0).unwrap()).unwrap();
        assert_eq!(json["min_threshold"], 1.0);
        assert_eq!(json["percent_change_limit"], 3.0);
    }
}
