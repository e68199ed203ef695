// Collaborators the orchestrator drives: tier validators, healers and the finalizer.
mod command;
mod finalizer;
mod healers;
mod semantic;
mod set;
mod types;
mod validators;

pub use command::CommandCollaborator;
pub use finalizer::CommandFinalizer;
pub use healers::CommandHealer;
pub use semantic::LlmSemanticValidator;
pub use set::CollaboratorSet;
pub use types::{
    BlueprintHealer, BlueprintValidator, CollaboratorError, ComponentHealer, ComponentValidator,
    SystemFinalizer,
};
pub use validators::{BindingIntegrationValidator, ComponentContractValidator, StructuralValidator};
