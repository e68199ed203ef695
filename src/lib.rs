//! Validation-driven system generation.
//!
//! A blueprint passes a dependency preflight and four ordered validation
//! tiers, with one bounded healing pass between attempts, before it is handed
//! to a finalizer. See [`pipeline::ValidationDrivenOrchestrator`].

pub mod blueprint;
pub mod collaborators;
pub mod config;
pub mod dependency;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod validation;

pub use error::{ErrorKind, GenerationError};
pub use pipeline::{CancelToken, GenerationEvent, ValidationDrivenOrchestrator, spawn_generation};
pub use validation::SystemGenerationResult;
