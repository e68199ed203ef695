use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::blueprint::Blueprint;
use crate::validation::GeneratedSystem;

use super::command::CommandCollaborator;
use super::types::{CollaboratorError, SystemFinalizer};

#[derive(Serialize)]
struct FinalizeRequest<'a> {
    blueprint: &'a Blueprint,
    output_dir: &'a PathBuf,
}

/// Hands the validated blueprint to an external generator.
#[derive(Debug, Clone)]
pub struct CommandFinalizer {
    command: CommandCollaborator,
    output_dir: PathBuf,
}

impl CommandFinalizer {
    pub fn new(command: CommandCollaborator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl SystemFinalizer for CommandFinalizer {
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    async fn finalize(&self, blueprint: &Blueprint) -> Result<GeneratedSystem, CollaboratorError> {
        let request = FinalizeRequest {
            blueprint,
            output_dir: &self.output_dir,
        };
        let system: GeneratedSystem = self.command.call(&request).await?;
        info!(
            output_dir = %system.output_dir.display(),
            files = system.files.len(),
            "system generated"
        );
        Ok(system)
    }
}
