use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::dependency::{DependencyError, DependencyStatus, describe_statuses};
use crate::validation::{FailureType, ValidationFailure, ValidationLevel};

/// Fieldless mirror of [`GenerationError`] for branching and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DependencyMissing,
    FrameworkValidation,
    ComponentLogicValidation,
    ComponentLogicHealingFailed,
    SystemIntegrationValidation,
    SystemIntegrationHealingFailed,
    SemanticValidation,
    SemanticHealingFailed,
    ValidationSequence,
    CollaboratorUnavailable,
    Cancelled,
    Finalization,
}

/// Why a generation run stopped.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("DEPENDENCY_MISSING: required dependencies unavailable: {}", describe_statuses(.missing))]
    DependencyMissing { missing: Vec<DependencyStatus> },

    #[error("FRAMEWORK_VALIDATION: framework validation failed (no healing path): {}", summarize(.failures))]
    FrameworkValidation { failures: Vec<ValidationFailure> },

    #[error("COMPONENT_LOGIC_VALIDATION: components [{}] failed component logic validation: {}", join(.components), summarize(.failures))]
    ComponentLogicValidation {
        components: Vec<String>,
        failures: Vec<ValidationFailure>,
    },

    #[error("COMPONENT_LOGIC_HEALING_FAILED: components [{}] still fail after healing: {}", join(.components), summarize(.failures))]
    ComponentLogicHealingFailed {
        components: Vec<String>,
        failures: Vec<ValidationFailure>,
    },

    #[error("SYSTEM_INTEGRATION_VALIDATION: system integration validation failed: {}", summarize(.failures))]
    SystemIntegrationValidation { failures: Vec<ValidationFailure> },

    #[error("SYSTEM_INTEGRATION_HEALING_FAILED: system integration still fails after config regeneration: {}", summarize(.failures))]
    SystemIntegrationHealingFailed { failures: Vec<ValidationFailure> },

    #[error("SEMANTIC_VALIDATION_FAILURE: {}{}", llm_prefix(.llm_unavailable), summarize(.failures))]
    SemanticValidation {
        failures: Vec<ValidationFailure>,
        llm_unavailable: bool,
    },

    #[error("SEMANTIC_HEALING_FAILED: semantic validation still fails after healing: {}", summarize(.failures))]
    SemanticHealingFailed { failures: Vec<ValidationFailure> },

    #[error("VALIDATION_SEQUENCE: {attempted} invoked before {required} passed")]
    ValidationSequence {
        attempted: ValidationLevel,
        required: ValidationLevel,
    },

    #[error("{role} is unavailable, no fallback available: {reason}")]
    CollaboratorUnavailable { role: String, reason: String },

    #[error("generation cancelled after {completed_levels} passed levels")]
    Cancelled { completed_levels: usize },

    #[error("finalization failed: {detail}")]
    Finalization { detail: String },
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::DependencyMissing { .. } => ErrorKind::DependencyMissing,
            GenerationError::FrameworkValidation { .. } => ErrorKind::FrameworkValidation,
            GenerationError::ComponentLogicValidation { .. } => ErrorKind::ComponentLogicValidation,
            GenerationError::ComponentLogicHealingFailed { .. } => {
                ErrorKind::ComponentLogicHealingFailed
            }
            GenerationError::SystemIntegrationValidation { .. } => {
                ErrorKind::SystemIntegrationValidation
            }
            GenerationError::SystemIntegrationHealingFailed { .. } => {
                ErrorKind::SystemIntegrationHealingFailed
            }
            GenerationError::SemanticValidation { .. } => ErrorKind::SemanticValidation,
            GenerationError::SemanticHealingFailed { .. } => ErrorKind::SemanticHealingFailed,
            GenerationError::ValidationSequence { .. } => ErrorKind::ValidationSequence,
            GenerationError::CollaboratorUnavailable { .. } => ErrorKind::CollaboratorUnavailable,
            GenerationError::Cancelled { .. } => ErrorKind::Cancelled,
            GenerationError::Finalization { .. } => ErrorKind::Finalization,
        }
    }

    /// The failure classification this error corresponds to, if any.
    pub fn failure_type(&self) -> Option<FailureType> {
        Some(match self {
            GenerationError::DependencyMissing { .. } => FailureType::DependencyMissing,
            GenerationError::FrameworkValidation { .. } => FailureType::FrameworkValidation,
            GenerationError::ComponentLogicValidation { .. } => {
                FailureType::ComponentLogicValidation
            }
            GenerationError::ComponentLogicHealingFailed { .. } => {
                FailureType::ComponentLogicHealingFailed
            }
            GenerationError::SystemIntegrationValidation { .. } => {
                FailureType::SystemIntegrationValidation
            }
            GenerationError::SystemIntegrationHealingFailed { .. } => {
                FailureType::SystemIntegrationHealingFailed
            }
            GenerationError::SemanticValidation { .. } => FailureType::SemanticValidationFailure,
            GenerationError::SemanticHealingFailed { .. } => FailureType::SemanticHealingFailed,
            GenerationError::ValidationSequence { .. } => FailureType::ValidationSequence,
            GenerationError::CollaboratorUnavailable { .. }
            | GenerationError::Cancelled { .. }
            | GenerationError::Finalization { .. } => return None,
        })
    }

    /// The tier the run stopped at, if it stopped inside one.
    pub fn level(&self) -> Option<ValidationLevel> {
        match self {
            GenerationError::FrameworkValidation { .. } => Some(ValidationLevel::Framework),
            GenerationError::ComponentLogicValidation { .. }
            | GenerationError::ComponentLogicHealingFailed { .. } => {
                Some(ValidationLevel::ComponentLogic)
            }
            GenerationError::SystemIntegrationValidation { .. }
            | GenerationError::SystemIntegrationHealingFailed { .. } => {
                Some(ValidationLevel::SystemIntegration)
            }
            GenerationError::SemanticValidation { .. }
            | GenerationError::SemanticHealingFailed { .. } => Some(ValidationLevel::Semantic),
            GenerationError::ValidationSequence { attempted, .. } => Some(*attempted),
            _ => None,
        }
    }

    /// Structured failures carried by tier errors.
    pub fn failures(&self) -> &[ValidationFailure] {
        match self {
            GenerationError::FrameworkValidation { failures }
            | GenerationError::ComponentLogicValidation { failures, .. }
            | GenerationError::ComponentLogicHealingFailed { failures, .. }
            | GenerationError::SystemIntegrationValidation { failures }
            | GenerationError::SystemIntegrationHealingFailed { failures }
            | GenerationError::SemanticValidation { failures, .. }
            | GenerationError::SemanticHealingFailed { failures } => failures,
            _ => &[],
        }
    }

    /// Error for a tier whose validator rejected the input and no heal was attempted.
    pub(crate) fn tier_failed(level: ValidationLevel, failures: Vec<ValidationFailure>) -> Self {
        match level {
            ValidationLevel::Framework => GenerationError::FrameworkValidation { failures },
            ValidationLevel::ComponentLogic => GenerationError::ComponentLogicValidation {
                components: blamed_components(&failures),
                failures,
            },
            ValidationLevel::SystemIntegration => {
                GenerationError::SystemIntegrationValidation { failures }
            }
            ValidationLevel::Semantic => GenerationError::SemanticValidation {
                failures,
                llm_unavailable: false,
            },
        }
    }

    /// Error for a tier that still fails after its single heal.
    pub(crate) fn healing_failed(level: ValidationLevel, failures: Vec<ValidationFailure>) -> Self {
        match level {
            ValidationLevel::Framework => GenerationError::FrameworkValidation { failures },
            ValidationLevel::ComponentLogic => GenerationError::ComponentLogicHealingFailed {
                components: blamed_components(&failures),
                failures,
            },
            ValidationLevel::SystemIntegration => {
                GenerationError::SystemIntegrationHealingFailed { failures }
            }
            ValidationLevel::Semantic => GenerationError::SemanticHealingFailed { failures },
        }
    }
}

impl From<DependencyError> for GenerationError {
    fn from(err: DependencyError) -> Self {
        match err {
            DependencyError::Missing { missing } => GenerationError::DependencyMissing { missing },
        }
    }
}

impl From<CollaboratorError> for GenerationError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::Unavailable { role, reason } => {
                GenerationError::CollaboratorUnavailable {
                    role: role.to_string(),
                    reason,
                }
            }
            other => GenerationError::CollaboratorUnavailable {
                role: "collaborator".into(),
                reason: other.to_string(),
            },
        }
    }
}

/// Distinct component names in failure order.
fn blamed_components(failures: &[ValidationFailure]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in failures.iter().filter_map(|f| f.component_name.as_ref()) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

fn join(components: &[String]) -> String {
    components.join(", ")
}

fn llm_prefix(llm_unavailable: &bool) -> &'static str {
    if *llm_unavailable {
        "LLM unavailable during semantic validation: "
    } else {
        ""
    }
}

fn summarize(failures: &[ValidationFailure]) -> String {
    if failures.is_empty() {
        return "no failure details recorded".into();
    }
    failures
        .iter()
        .map(|f| match &f.component_name {
            Some(component) => format!("[{component}] {}", f.error_message),
            None => f.error_message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(level: ValidationLevel, component: &str, msg: &str) -> ValidationFailure {
        ValidationFailure::new(level, msg).for_component(component)
    }

    #[test]
    fn healing_failed_message_names_component_and_type() {
        let level = ValidationLevel::ComponentLogic;
        let err = GenerationError::healing_failed(
            level,
            vec![
                failure(level, "X", "missing outputs"),
                failure(level, "X", "empty schema"),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("COMPONENT_LOGIC_HEALING_FAILED"));
        assert!(msg.contains("[X] missing outputs"));
        assert_eq!(err.kind(), ErrorKind::ComponentLogicHealingFailed);
        match err {
            GenerationError::ComponentLogicHealingFailed { components, .. } => {
                assert_eq!(components, vec!["X"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tier_failed_maps_each_level() {
        for level in ValidationLevel::ALL {
            let err = GenerationError::tier_failed(level, vec![]);
            assert_eq!(err.level(), Some(level));
            assert_eq!(err.failure_type(), Some(level.validation_failure_type()));
        }
    }

    #[test]
    fn semantic_llm_outage_is_distinguishable() {
        let err = GenerationError::SemanticValidation {
            failures: vec![],
            llm_unavailable: true,
        };
        assert!(err.to_string().contains("LLM unavailable"));
        assert_eq!(err.kind(), ErrorKind::SemanticValidation);
    }

    #[test]
    fn unavailable_collaborator_says_no_fallback() {
        let err: GenerationError = CollaboratorError::Unavailable {
            role: "ast_healer",
            reason: "no command configured".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
        assert!(err.to_string().contains("no fallback available"));
        assert_eq!(err.failure_type(), None);
    }
}
