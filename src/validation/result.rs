use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

use super::level::ValidationLevel;
use super::types::{GeneratedSystem, ValidationResult};

/// Top-level outcome of one generation run. Built the same way on success
/// and on failure; `validation_results` is the full audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemGenerationResult {
    pub successful: bool,
    pub generated_system: Option<GeneratedSystem>,
    pub validation_levels_passed: usize,
    pub validation_results: Vec<ValidationResult>,
    pub healing_applied: bool,
    pub total_execution_time: f64,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub failed_level: Option<ValidationLevel>,
    pub blueprint_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl SystemGenerationResult {
    /// True when any recorded attempt at `level` passed. A level may appear
    /// twice (before and after healing).
    pub fn level_passed(&self, level: ValidationLevel) -> bool {
        self.validation_results
            .iter()
            .any(|r| r.level == level && r.passed)
    }

    pub fn level1_passed(&self) -> bool {
        self.level_passed(ValidationLevel::Framework)
    }

    pub fn level2_passed(&self) -> bool {
        self.level_passed(ValidationLevel::ComponentLogic)
    }

    pub fn level3_passed(&self) -> bool {
        self.level_passed(ValidationLevel::SystemIntegration)
    }

    pub fn level4_passed(&self) -> bool {
        self.level_passed(ValidationLevel::Semantic)
    }

    pub fn all_levels_passed(&self) -> bool {
        ValidationLevel::ALL
            .into_iter()
            .all(|level| self.level_passed(level))
    }

    /// Recorded attempts at one level, in order.
    pub fn results_for(&self, level: ValidationLevel) -> impl Iterator<Item = &ValidationResult> {
        self.validation_results.iter().filter(move |r| r.level == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationFailure;

    fn result_with(results: Vec<ValidationResult>) -> SystemGenerationResult {
        SystemGenerationResult {
            successful: false,
            generated_system: None,
            validation_levels_passed: results.iter().filter(|r| r.passed).count(),
            validation_results: results,
            healing_applied: false,
            total_execution_time: 0.0,
            error_message: None,
            error_kind: None,
            failed_level: None,
            blueprint_path: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn level_passes_if_any_attempt_passed() {
        let level = ValidationLevel::ComponentLogic;
        let result = result_with(vec![
            ValidationResult::pass(ValidationLevel::Framework),
            ValidationResult::from_failures(level, vec![ValidationFailure::new(level, "bad")]),
            ValidationResult::pass(level),
        ]);
        assert!(result.level1_passed());
        assert!(result.level2_passed());
        assert!(!result.level3_passed());
        assert!(!result.all_levels_passed());
        assert_eq!(result.results_for(level).count(), 2);
    }

    #[test]
    fn all_levels_passed_needs_every_tier() {
        let result = result_with(ValidationLevel::ALL.map(ValidationResult::pass).to_vec());
        assert!(result.all_levels_passed());
        assert!(result.level4_passed());
    }
}
