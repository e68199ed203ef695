// Validation-driven generation: tier sequencing, healing dispatch and result aggregation.
mod orchestrator;
mod run;
mod types;

pub use orchestrator::{LLM_UNAVAILABLE, ValidationDrivenOrchestrator, spawn_generation};
pub use run::GenerationRun;
pub use types::{CancelToken, GenerationEvent, HealTarget};
