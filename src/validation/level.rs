use std::fmt;

use serde::{Deserialize, Serialize};

/// The four validation tiers, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Framework = 1,
    ComponentLogic = 2,
    SystemIntegration = 3,
    Semantic = 4,
}

impl ValidationLevel {
    pub const ALL: [ValidationLevel; 4] = [
        ValidationLevel::Framework,
        ValidationLevel::ComponentLogic,
        ValidationLevel::SystemIntegration,
        ValidationLevel::Semantic,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.number() == n)
    }

    /// The tier that must have passed before this one may run.
    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number().wrapping_sub(1))
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationLevel::Framework => "framework",
            ValidationLevel::ComponentLogic => "component_logic",
            ValidationLevel::SystemIntegration => "system_integration",
            ValidationLevel::Semantic => "semantic",
        }
    }

    /// Failure type recorded when this tier's validator rejects its input.
    pub fn validation_failure_type(self) -> FailureType {
        match self {
            ValidationLevel::Framework => FailureType::FrameworkValidation,
            ValidationLevel::ComponentLogic => FailureType::ComponentLogicValidation,
            ValidationLevel::SystemIntegration => FailureType::SystemIntegrationValidation,
            ValidationLevel::Semantic => FailureType::SemanticValidationFailure,
        }
    }

    /// Failure type recorded when the tier still fails after its one heal.
    /// Level 1 has no healing path.
    pub fn healing_failure_type(self) -> Option<FailureType> {
        match self {
            ValidationLevel::Framework => None,
            ValidationLevel::ComponentLogic => Some(FailureType::ComponentLogicHealingFailed),
            ValidationLevel::SystemIntegration => Some(FailureType::SystemIntegrationHealingFailed),
            ValidationLevel::Semantic => Some(FailureType::SemanticHealingFailed),
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {} ({})", self.number(), self.as_str())
    }
}

/// Classification of a single detected problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    DependencyMissing,
    FrameworkValidation,
    ComponentLogicValidation,
    ComponentLogicHealingFailed,
    SystemIntegrationValidation,
    SystemIntegrationHealingFailed,
    SemanticValidationFailure,
    SemanticHealingFailed,
    ValidationSequence,
}

impl FailureType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureType::DependencyMissing => "DEPENDENCY_MISSING",
            FailureType::FrameworkValidation => "FRAMEWORK_VALIDATION",
            FailureType::ComponentLogicValidation => "COMPONENT_LOGIC_VALIDATION",
            FailureType::ComponentLogicHealingFailed => "COMPONENT_LOGIC_HEALING_FAILED",
            FailureType::SystemIntegrationValidation => "SYSTEM_INTEGRATION_VALIDATION",
            FailureType::SystemIntegrationHealingFailed => "SYSTEM_INTEGRATION_HEALING_FAILED",
            FailureType::SemanticValidationFailure => "SEMANTIC_VALIDATION_FAILURE",
            FailureType::SemanticHealingFailed => "SEMANTIC_HEALING_FAILED",
            FailureType::ValidationSequence => "VALIDATION_SEQUENCE",
        }
    }

    pub fn is_healing_failure(self) -> bool {
        matches!(
            self,
            FailureType::ComponentLogicHealingFailed
                | FailureType::SystemIntegrationHealingFailed
                | FailureType::SemanticHealingFailed
        )
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_totally_ordered() {
        assert!(ValidationLevel::Framework < ValidationLevel::ComponentLogic);
        assert!(ValidationLevel::SystemIntegration < ValidationLevel::Semantic);
        let mut shuffled = vec![
            ValidationLevel::Semantic,
            ValidationLevel::Framework,
            ValidationLevel::SystemIntegration,
            ValidationLevel::ComponentLogic,
        ];
        shuffled.sort();
        assert_eq!(shuffled, ValidationLevel::ALL.to_vec());
    }

    #[test]
    fn previous_and_next_walk_the_chain() {
        assert_eq!(ValidationLevel::Framework.previous(), None);
        assert_eq!(
            ValidationLevel::Semantic.previous(),
            Some(ValidationLevel::SystemIntegration)
        );
        assert_eq!(
            ValidationLevel::Framework.next(),
            Some(ValidationLevel::ComponentLogic)
        );
        assert_eq!(ValidationLevel::Semantic.next(), None);
    }

    #[test]
    fn framework_has_no_healing_failure_type() {
        assert_eq!(ValidationLevel::Framework.healing_failure_type(), None);
        assert_eq!(
            ValidationLevel::ComponentLogic.healing_failure_type(),
            Some(FailureType::ComponentLogicHealingFailed)
        );
    }

    #[test]
    fn failure_type_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&FailureType::ComponentLogicHealingFailed).unwrap();
        assert_eq!(json, "\"COMPONENT_LOGIC_HEALING_FAILED\"");
        assert_eq!(
            FailureType::SemanticHealingFailed.to_string(),
            "SEMANTIC_HEALING_FAILED"
        );
    }
}
