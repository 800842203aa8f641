use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::error::ValidationError;

/// Unique observation identifier.
pub type ObservationId = Uuid;

/// Metadata key holding the defect count of a production reading.
pub const DEFECTS_KEY: &str = "defects";
/// Metadata key overriding the unit count used as defect-rate denominator.
pub const UNITS_KEY: &str = "units";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One stored metric reading. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub category: Category,
    pub date: NaiveDate,
    pub value: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Observation {
    /// Defect percentage derived from `defects / units * 100`.
    ///
    /// Returns `None` when the reading carries no parseable defect count.
    /// `units` comes from metadata when present, otherwise from `value`;
    /// a non-positive unit count yields a rate of 0.
    pub fn defect_rate(&self) -> Option<f64> {
        let defects: f64 = self.metadata.get(DEFECTS_KEY)?.trim().parse().ok()?;
        let units = self
            .metadata
            .get(UNITS_KEY)
            .and_then(|u| u.trim().parse::<f64>().ok())
            .unwrap_or(self.value);

        if !defects.is_finite() || !units.is_finite() || units <= 0.0 {
            return Some(0.0);
        }
        Some(defects / units * 100.0)
    }
}

/// Unvalidated reading as handed over by import or manual entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    #[serde(default)]
    pub id: Option<ObservationId>,
    pub date: String,
    pub value: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NewObservation {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            id: None,
            date: date.into(),
            value,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: ObservationId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validate and stamp an id, producing the record that gets stored.
    pub fn into_observation(self, category: Category) -> Result<Observation, ValidationError> {
        if !self.value.is_finite() {
            return Err(ValidationError::NonFiniteValue(self.value));
        }
        let date = parse_date(&self.date)?;
        Ok(Observation {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            category,
            date,
            value: self.value,
            metadata: self.metadata,
        })
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        input: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_observation_assigns_id_when_absent() {
        let obs = NewObservation::new("2024-01-02", 10.0)
            .into_observation(Category::sales())
            .unwrap();
        assert_eq!(obs.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(!obs.id.is_nil());
    }

    #[test]
    fn into_observation_keeps_given_id() {
        let id = Uuid::new_v4();
        let obs = NewObservation::new("2024-01-02", 10.0)
            .with_id(id)
            .into_observation(Category::sales())
            .unwrap();
        assert_eq!(obs.id, id);
    }

    #[test]
    fn rejects_non_finite_value() {
        let err = NewObservation::new("2024-01-02", f64::NAN)
            .into_observation(Category::sales())
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFiniteValue(_)));

        let err = NewObservation::new("2024-01-02", f64::INFINITY)
            .into_observation(Category::sales())
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFiniteValue(_)));
    }

    #[test]
    fn rejects_bad_dates() {
        for bad in ["", "2024-13-01", "2024-02-30", "01/02/2024", "yesterday"] {
            let err = NewObservation::new(bad, 1.0)
                .into_observation(Category::sales())
                .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidDate { .. }), "{bad}");
        }
    }

    #[test]
    fn defect_rate_uses_value_as_units() {
        let obs = NewObservation::new("2024-01-01", 200.0)
            .with_metadata(DEFECTS_KEY, "15")
            .into_observation(Category::production())
            .unwrap();
        assert_eq!(obs.defect_rate(), Some(7.5));
    }

    #[test]
    fn defect_rate_prefers_units_metadata() {
        let obs = NewObservation::new("2024-01-01", 999.0)
            .with_metadata(DEFECTS_KEY, "5")
            .with_metadata(UNITS_KEY, "50")
            .into_observation(Category::production())
            .unwrap();
        assert_eq!(obs.defect_rate(), Some(10.0));
    }

    #[test]
    fn defect_rate_zero_units() {
        let obs = NewObservation::new("2024-01-01", 0.0)
            .with_metadata(DEFECTS_KEY, "5")
            .into_observation(Category::production())
            .unwrap();
        assert_eq!(obs.defect_rate(), Some(0.0));
    }

    #[test]
    fn defect_rate_absent_without_defects() {
        let obs = NewObservation::new("2024-01-01", 10.0)
            .with_metadata("line", "A")
            .into_observation(Category::production())
            .unwrap();
        assert_eq!(obs.defect_rate(), None);
    }
}
