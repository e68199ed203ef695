use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::blueprint::Blueprint;
use crate::config::Environment;
use crate::llm::{LlmClient, LlmProviderConfig};
use crate::validation::{ValidationFailure, ValidationLevel, ValidationResult};

use super::types::{BlueprintValidator, CollaboratorError};

const SYSTEM_PROMPT: &str = "You review system blueprints for semantic reasonableness. \
Answer with JSON only: {\"reasonable\": bool, \"issues\": [{\"component\": string|null, \"message\": string}]}.";

const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct Verdict {
    reasonable: bool,
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    #[serde(default)]
    component: Option<String>,
    message: String,
}

/// Level 4: asks an LLM whether the blueprint makes sense as a system.
///
/// The client is resolved per call so a credential that disappears mid-run
/// surfaces as [`CollaboratorError::LlmUnavailable`].
pub struct LlmSemanticValidator {
    providers: Vec<LlmProviderConfig>,
    env: Environment,
    timeout: Duration,
}

impl LlmSemanticValidator {
    pub fn new(providers: Vec<LlmProviderConfig>, env: Environment, timeout: Duration) -> Self {
        Self {
            providers,
            env,
            timeout,
        }
    }
}

#[async_trait]
impl BlueprintValidator for LlmSemanticValidator {
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    async fn validate(&self, blueprint: &Blueprint) -> Result<ValidationResult, CollaboratorError> {
        let level = ValidationLevel::Semantic;
        let client = LlmClient::from_environment(&self.providers, &self.env, self.timeout)?;
        let reply = client
            .complete(Some(SYSTEM_PROMPT), &describe(blueprint), MAX_TOKENS)
            .await?;
        debug!(provider = %client.provider(), chars = reply.len(), "semantic verdict received");

        let verdict = parse_verdict(&reply)?;
        let advisories = verdict.issues.len();
        let failures = if verdict.reasonable {
            Vec::new()
        } else if verdict.issues.is_empty() {
            vec![ValidationFailure::new(level, "blueprint judged semantically unreasonable").healable()]
        } else {
            verdict
                .issues
                .into_iter()
                .map(|issue| {
                    let failure = ValidationFailure::new(level, issue.message).healable();
                    match issue.component {
                        Some(component) => failure.for_component(component),
                        None => failure,
                    }
                })
                .collect()
        };

        Ok(ValidationResult::from_failures(level, failures)
            .with_metadata("provider", client.provider().as_str())
            .with_metadata("model", client.model())
            .with_metadata("issues", advisories))
    }
}

/// Compact, prompt-sized rendering of the blueprint.
fn describe(blueprint: &Blueprint) -> String {
    let mut out = format!("System `{}`", blueprint.name);
    if !blueprint.description.is_empty() {
        out.push_str(&format!(": {}", blueprint.description));
    }
    out.push_str("\nComponents:\n");
    for c in &blueprint.components {
        let ports = |ports: &[crate::blueprint::Port]| {
            ports
                .iter()
                .map(|p| format!("{}:{}", p.name, p.schema))
                .collect::<Vec<_>>()
                .join(", ")
        };
        out.push_str(&format!(
            "- {} ({}) in[{}] out[{}] {}\n",
            c.name,
            c.component_type,
            ports(&c.inputs),
            ports(&c.outputs),
            c.description
        ));
    }
    if !blueprint.bindings.is_empty() {
        out.push_str("Bindings:\n");
        for b in &blueprint.bindings {
            out.push_str(&format!(
                "- {}.{} -> {}.{}\n",
                b.from_component,
                b.from_port,
                b.to_components.join("|"),
                b.to_port
            ));
        }
    }
    out
}

/// Models like to wrap JSON in prose or code fences; take the outermost object.
fn parse_verdict(reply: &str) -> Result<Verdict, CollaboratorError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(CollaboratorError::Failed(format!(
                "semantic verdict is not JSON: {:?}",
                reply.chars().take(120).collect::<String>()
            )));
        }
    };
    serde_json::from_str(body)
        .map_err(|e| CollaboratorError::Failed(format!("semantic verdict has the wrong shape: {e}")))
}
