use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::blueprint::{Blueprint, Component};
use crate::llm::LlmError;
use crate::validation::{GeneratedSystem, HealingResult, ValidationFailure, ValidationResult};

/// Infrastructure failure while invoking a collaborator. Expected outcomes
/// (a tier rejecting its input, a heal that does not work) are values, not
/// errors.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{role} is unavailable: {reason}")]
    Unavailable { role: &'static str, reason: String },

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(#[from] LlmError),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("`{command}` exited with {}: {stderr}", exit_label(.code))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("invalid JSON exchanged with `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Failed(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".into(),
    }
}

/// Validates a whole blueprint (levels 1, 3 and 4). Must not mutate its input.
#[async_trait]
pub trait BlueprintValidator: Send + Sync {
    async fn validate(&self, blueprint: &Blueprint) -> Result<ValidationResult, CollaboratorError>;
}

/// Validates one component in its normalized dict form (level 2).
#[async_trait]
pub trait ComponentValidator: Send + Sync {
    async fn validate_component(&self, component: &Value)
    -> Result<ValidationResult, CollaboratorError>;
}

/// Single-pass remediation of one component.
#[async_trait]
pub trait ComponentHealer: Send + Sync {
    async fn heal_component(
        &self,
        component: &Component,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, CollaboratorError>;
}

/// Single-pass remediation of a whole blueprint.
#[async_trait]
pub trait BlueprintHealer: Send + Sync {
    async fn heal_blueprint(
        &self,
        blueprint: &Blueprint,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, CollaboratorError>;
}

/// Turns a fully validated blueprint into a deployable system.
#[async_trait]
pub trait SystemFinalizer: Send + Sync {
    async fn finalize(&self, blueprint: &Blueprint) -> Result<GeneratedSystem, CollaboratorError>;
}
