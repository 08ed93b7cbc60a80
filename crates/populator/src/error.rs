//! Error types for the populator crate.

use geotess::GeoTessError;
use thiserror::Error;

/// Every missing or invalid field of a [`crate::PopulationConfig`], reported
/// together.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid population config: {}", .problems.join(", "))]
pub struct PopulationConfigError {
    pub problems: Vec<String>,
}

impl PopulationConfigError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// Whether `field` is named by one of the problems.
    pub fn mentions(&self, field: &str) -> bool {
        self.problems.iter().any(|p| p.contains(field))
    }
}

impl From<PopulationConfigError> for GeoTessError {
    fn from(err: PopulationConfigError) -> Self {
        GeoTessError::invalid_argument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_problem() {
        let err = PopulationConfigError::new(vec![
            "stations not set".to_string(),
            "minimum_magnitude not set".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid population config: stations not set, minimum_magnitude not set"
        );
        assert!(err.mentions("minimum_magnitude"));
        assert!(!err.mentions("phases"));
    }

    #[test]
    fn test_converts_to_invalid_argument() {
        let err: GeoTessError = PopulationConfigError::new(vec!["phases not set".into()]).into();
        assert!(matches!(err, GeoTessError::InvalidArgument(ref msg) if msg.contains("phases")));
    }
}
