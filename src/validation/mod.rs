// Validation result model: levels, failures, healing outcomes and the run aggregate.
mod level;
mod result;
mod types;

pub use level::{FailureType, ValidationLevel};
pub use result::SystemGenerationResult;
pub use types::{GeneratedSystem, HealingResult, HealingType, ValidationFailure, ValidationResult};
