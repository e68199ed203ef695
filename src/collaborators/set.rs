use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, Environment};
use crate::validation::HealingType;

use super::command::CommandCollaborator;
use super::finalizer::CommandFinalizer;
use super::healers::CommandHealer;
use super::semantic::LlmSemanticValidator;
use super::types::{
    BlueprintHealer, BlueprintValidator, CollaboratorError, ComponentHealer, ComponentValidator,
    SystemFinalizer,
};
use super::validators::{BindingIntegrationValidator, ComponentContractValidator, StructuralValidator};

/// Every validator, healer and the finalizer, built once up front.
#[derive(Clone)]
pub struct CollaboratorSet {
    pub framework: Arc<dyn BlueprintValidator>,
    pub component_logic: Arc<dyn ComponentValidator>,
    pub integration: Arc<dyn BlueprintValidator>,
    pub semantic: Arc<dyn BlueprintValidator>,
    pub ast_healer: Arc<dyn ComponentHealer>,
    pub config_regenerator: Arc<dyn BlueprintHealer>,
    pub semantic_healer: Arc<dyn BlueprintHealer>,
    pub finalizer: Arc<dyn SystemFinalizer>,
}

impl CollaboratorSet {
    /// Built-in validators plus command-backed healers and finalizer.
    ///
    /// A role with no configured command fails construction; there is no
    /// no-op stand-in.
    pub fn from_config(config: &Config, env: Environment) -> Result<Self, CollaboratorError> {
        let commands = &config.collaborators;
        let healer_timeout = config.timeouts.healer.duration();

        let ast = CommandCollaborator::new("ast_healer", commands.ast_healer.clone(), healer_timeout)?;
        let regenerator = CommandCollaborator::new(
            "config_regenerator",
            commands.config_regenerator.clone(),
            healer_timeout,
        )?;
        let semantic = CommandCollaborator::new(
            "semantic_healer",
            commands.semantic_healer.clone(),
            healer_timeout,
        )?;
        let finalizer = CommandCollaborator::new(
            "finalizer",
            commands.finalizer.clone(),
            config.timeouts.finalizer.duration(),
        )?;

        Ok(Self {
            framework: Arc::new(StructuralValidator),
            component_logic: Arc::new(ComponentContractValidator),
            integration: Arc::new(BindingIntegrationValidator),
            semantic: Arc::new(LlmSemanticValidator::new(
                config.dependencies.llm_providers.clone(),
                env,
                config.timeouts.validator.duration(),
            )),
            ast_healer: Arc::new(CommandHealer::new(ast, HealingType::Ast)),
            config_regenerator: Arc::new(CommandHealer::new(
                regenerator,
                HealingType::ConfigRegeneration,
            )),
            semantic_healer: Arc::new(CommandHealer::new(semantic, HealingType::Semantic)),
            finalizer: Arc::new(CommandFinalizer::new(
                finalizer,
                Path::new(&commands.output_dir),
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn missing_command_names_the_role() {
        let mut config = Config::default();
        config.collaborators.ast_healer = argv("heal-ast");
        config.collaborators.semantic_healer = argv("heal-semantic");
        config.collaborators.finalizer = argv("finalize");

        let err = CollaboratorSet::from_config(&config, Environment::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            CollaboratorError::Unavailable {
                role: "config_regenerator",
                ..
            }
        ));
    }

    #[test]
    fn fully_configured_set_builds() {
        let mut config = Config::default();
        config.collaborators.ast_healer = argv("heal-ast");
        config.collaborators.semantic_healer = argv("heal-semantic");
        config.collaborators.config_regenerator = argv("regen");
        config.collaborators.finalizer = argv("finalize");
        assert!(CollaboratorSet::from_config(&config, Environment::default()).is_ok());
    }
}
