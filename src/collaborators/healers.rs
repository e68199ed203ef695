use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::blueprint::{Blueprint, Component};
use crate::validation::{HealingResult, HealingType, ValidationFailure};

use super::command::CommandCollaborator;
use super::types::{BlueprintHealer, CollaboratorError, ComponentHealer};

#[derive(Serialize)]
struct HealRequest<'a, T: Serialize> {
    kind: &'static str,
    target: &'a T,
    failures: &'a [ValidationFailure],
}

/// A healer backed by an external command.
///
/// The command answers with a [`HealingResult`]; its `healing_type` is
/// overwritten with the kind this healer was configured for.
#[derive(Debug, Clone)]
pub struct CommandHealer {
    command: CommandCollaborator,
    healing_type: HealingType,
}

impl CommandHealer {
    pub fn new(command: CommandCollaborator, healing_type: HealingType) -> Self {
        Self {
            command,
            healing_type,
        }
    }

    async fn heal<T: Serialize + Sync>(
        &self,
        target: &T,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, CollaboratorError> {
        let request = HealRequest {
            kind: self.healing_type.as_str(),
            target,
            failures,
        };
        let mut result: HealingResult = self.command.call(&request).await?;
        result.healing_type = self.healing_type;
        info!(
            role = self.command.role(),
            successful = result.healing_successful,
            "healer answered"
        );
        Ok(result)
    }
}

#[async_trait]
impl ComponentHealer for CommandHealer {
    #[instrument(skip_all, fields(component = %component.name))]
    async fn heal_component(
        &self,
        component: &Component,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, CollaboratorError> {
        self.heal(component, failures).await
    }
}

#[async_trait]
impl BlueprintHealer for CommandHealer {
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    async fn heal_blueprint(
        &self,
        blueprint: &Blueprint,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, CollaboratorError> {
        self.heal(blueprint, failures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::ComponentType;
    use crate::validation::ValidationLevel;
    use std::time::Duration;

    fn healer(script: &str, healing_type: HealingType) -> CommandHealer {
        let command = CommandCollaborator::new(
            "ast_healer",
            vec!["sh".into(), "-c".into(), script.into()],
            Duration::from_secs(5),
        )
        .unwrap();
        CommandHealer::new(command, healing_type)
    }

    #[tokio::test]
    async fn component_heal_decodes_healed_component() {
        let script = r#"cat >/dev/null; echo '{"healing_type":"semantic","healing_successful":true,"healed_component":{"name":"x","type":"Source","outputs":[{"name":"o","schema":"T"}]}}'"#;
        let failure = ValidationFailure::new(ValidationLevel::ComponentLogic, "no outputs")
            .for_component("x")
            .healable();
        let result = healer(script, HealingType::Ast)
            .heal_component(&Component::new("x", ComponentType::Source), &[failure])
            .await
            .unwrap();
        assert!(result.healing_successful);
        assert_eq!(result.healing_type, HealingType::Ast);
        assert_eq!(result.healed_component.unwrap().outputs.len(), 1);
    }

    #[tokio::test]
    async fn request_carries_kind_target_and_failures() {
        // Reply with a failed heal whose message is the request's `kind`.
        let script = r#"kind=$(sed -n 's/.*"kind":"\([a-z_]*\)".*/\1/p'); echo "{\"healing_type\":\"ast\",\"healing_successful\":false,\"error_message\":\"$kind\"}""#;
        let blueprint = Blueprint::new("bp", vec![Component::new("x", ComponentType::Sink)]);
        let result = healer(script, HealingType::ConfigRegeneration)
            .heal_blueprint(&blueprint, &[])
            .await
            .unwrap();
        assert!(!result.healing_successful);
        assert_eq!(result.error_message.as_deref(), Some("config_regeneration"));
        assert_eq!(result.healing_type, HealingType::ConfigRegeneration);
    }
}
