use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blueprint::{Blueprint, Component};

use super::level::{FailureType, ValidationLevel};

/// One detected problem. Never merged with another failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub component_name: Option<String>,
    pub failure_type: FailureType,
    pub error_message: String,
    pub healing_candidate: bool,
    pub level: ValidationLevel,
    pub timestamp: DateTime<Utc>,
}

impl ValidationFailure {
    /// A failure of the tier's own validation kind, not yet marked healable.
    pub fn new(level: ValidationLevel, error_message: impl Into<String>) -> Self {
        Self::of_type(level, level.validation_failure_type(), error_message)
    }

    pub fn of_type(
        level: ValidationLevel,
        failure_type: FailureType,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            component_name: None,
            failure_type,
            error_message: error_message.into(),
            healing_candidate: false,
            level,
            timestamp: Utc::now(),
        }
    }

    pub fn for_component(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }

    pub fn healable(mut self) -> Self {
        self.healing_candidate = true;
        self
    }
}

/// Outcome of one tier execution attempt. A re-validation after healing is a
/// second instance, never a mutation of the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub level: ValidationLevel,
    #[serde(default)]
    pub failures: Vec<ValidationFailure>,
    #[serde(default)]
    pub healing_applied: bool,
    #[serde(default)]
    pub healing_results: Vec<HealingResult>,
    /// Wall-clock seconds for this attempt.
    #[serde(default)]
    pub execution_time: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ValidationResult {
    pub fn pass(level: ValidationLevel) -> Self {
        Self::from_failures(level, Vec::new())
    }

    /// Passed iff `failures` is empty.
    pub fn from_failures(level: ValidationLevel, failures: Vec<ValidationFailure>) -> Self {
        Self {
            passed: failures.is_empty(),
            level,
            failures,
            healing_applied: false,
            healing_results: Vec::new(),
            execution_time: 0.0,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_healing_candidates(&self) -> bool {
        self.failures.iter().any(|f| f.healing_candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingType {
    Ast,
    Semantic,
    ConfigRegeneration,
}

impl HealingType {
    pub fn as_str(self) -> &'static str {
        match self {
            HealingType::Ast => "ast",
            HealingType::Semantic => "semantic",
            HealingType::ConfigRegeneration => "config_regeneration",
        }
    }
}

/// Output of one remediation pass. Expected remediation failure is
/// `healing_successful == false`, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingResult {
    pub healing_type: HealingType,
    pub healing_successful: bool,
    #[serde(default)]
    pub healed_component: Option<Component>,
    #[serde(default)]
    pub healed_blueprint: Option<Blueprint>,
    #[serde(default)]
    pub healing_details: Map<String, Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub execution_time: f64,
}

impl HealingResult {
    pub fn healed_component(healing_type: HealingType, component: Component) -> Self {
        Self {
            healing_type,
            healing_successful: true,
            healed_component: Some(component),
            healed_blueprint: None,
            healing_details: Map::new(),
            error_message: None,
            execution_time: 0.0,
        }
    }

    pub fn healed_blueprint(healing_type: HealingType, blueprint: Blueprint) -> Self {
        Self {
            healing_type,
            healing_successful: true,
            healed_component: None,
            healed_blueprint: Some(blueprint),
            healing_details: Map::new(),
            error_message: None,
            execution_time: 0.0,
        }
    }

    pub fn failed(healing_type: HealingType, error_message: impl Into<String>) -> Self {
        Self {
            healing_type,
            healing_successful: false,
            healed_component: None,
            healed_blueprint: None,
            healing_details: Map::new(),
            error_message: Some(error_message.into()),
            execution_time: 0.0,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.healing_details.insert(key.into(), value.into());
        self
    }
}

/// The deployable artifact the finalizer produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSystem {
    pub name: String,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_failures_passes_only_when_empty() {
        let level = ValidationLevel::SystemIntegration;
        assert!(ValidationResult::from_failures(level, vec![]).passed);
        let failed =
            ValidationResult::from_failures(level, vec![ValidationFailure::new(level, "boom")]);
        assert!(!failed.passed);
        assert_eq!(
            failed.failures[0].failure_type,
            FailureType::SystemIntegrationValidation
        );
    }

    #[test]
    fn healing_candidates_are_opt_in() {
        let level = ValidationLevel::ComponentLogic;
        let plain = ValidationResult::from_failures(level, vec![ValidationFailure::new(level, "x")]);
        assert!(!plain.has_healing_candidates());
        let healable = ValidationResult::from_failures(
            level,
            vec![ValidationFailure::new(level, "x").for_component("a").healable()],
        );
        assert!(healable.has_healing_candidates());
        assert_eq!(healable.failures[0].component_name.as_deref(), Some("a"));
    }

    #[test]
    fn healing_result_deserializes_with_defaults() {
        let raw = r#"{"healing_type": "config_regeneration", "healing_successful": false}"#;
        let result: HealingResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.healing_type, HealingType::ConfigRegeneration);
        assert!(result.healed_blueprint.is_none());
        assert!(result.healing_details.is_empty());
    }
}
