use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Metric family an observation belongs to (e.g. `sales`, `traffic`).
///
/// Names are normalized to trimmed lowercase so `"Sales "` and `"sales"`
/// address the same series and rule set. Only ASCII letters, digits, `-`
/// and `_` are accepted, since the name doubles as a storage key segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub const SALES: &'static str = "sales";
    pub const TRAFFIC: &'static str = "traffic";
    pub const PRODUCTION: &'static str = "production";
    pub const FINANCIAL: &'static str = "financial";

    pub fn new(name: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = name.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        {
            return Err(ValidationError::InvalidCategory(normalized));
        }
        Ok(Self(normalized))
    }

    pub fn sales() -> Self {
        Self(Self::SALES.to_string())
    }

    pub fn traffic() -> Self {
        Self(Self::TRAFFIC.to_string())
    }

    pub fn production() -> Self {
        Self(Self::PRODUCTION.to_string())
    }

    pub fn financial() -> Self {
        Self(Self::FINANCIAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Category {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

impl std::str::FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let c = Category::new("  Sales ").unwrap();
        assert_eq!(c, Category::sales());
        assert_eq!(c.to_string(), "sales");
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Category::new("   "), Err(ValidationError::EmptyCategory));
    }

    #[test]
    fn rejects_key_unsafe_names() {
        assert_eq!(
            Category::new("web traffic"),
            Err(ValidationError::InvalidCategory("web traffic".to_string()))
        );
        assert!(Category::new("../alerts").is_err());
        assert!(Category::new("cost-center_2").is_ok());
    }

    #[test]
    fn serde_goes_through_validation() {
        let c: Category = serde_json::from_str("\"TRAFFIC\"").unwrap();
        assert_eq!(c, Category::traffic());
        assert!(serde_json::from_str::<Category>("\"\"").is_err());
    }
}
