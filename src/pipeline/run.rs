use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;

use crate::blueprint::{Blueprint, Component};
use crate::error::GenerationError;
use crate::validation::{GeneratedSystem, SystemGenerationResult, ValidationLevel, ValidationResult};

/// State of one generation run: the working blueprint and the append-only
/// audit trail of tier attempts.
#[derive(Debug)]
pub struct GenerationRun {
    blueprint: Blueprint,
    source_path: Option<PathBuf>,
    results: Vec<ValidationResult>,
    started: Instant,
}

impl GenerationRun {
    pub fn new(blueprint: &Blueprint) -> Self {
        Self {
            blueprint: blueprint.clone(),
            source_path: blueprint.source_path.clone(),
            results: Vec::new(),
            started: Instant::now(),
        }
    }

    /// The blueprint as healed so far.
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    pub(crate) fn record(&mut self, result: ValidationResult) {
        self.results.push(result);
    }

    pub(crate) fn replace_blueprint(&mut self, mut healed: Blueprint) {
        healed.source_path = self.source_path.clone();
        self.blueprint = healed;
    }

    pub(crate) fn replace_component(&mut self, index: usize, healed: Component) {
        if let Some(slot) = self.blueprint.components.get_mut(index) {
            *slot = healed;
        }
    }

    pub fn level_passed(&self, level: ValidationLevel) -> bool {
        self.results.iter().any(|r| r.level == level && r.passed)
    }

    pub fn levels_passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn healing_applied(&self) -> bool {
        self.results.iter().any(|r| r.healing_applied)
    }

    /// `level` may only run once its predecessor has a passing result.
    pub(crate) fn ensure_ready(&self, level: ValidationLevel) -> Result<(), GenerationError> {
        match level.previous() {
            Some(required) if !self.level_passed(required) => {
                Err(GenerationError::ValidationSequence {
                    attempted: level,
                    required,
                })
            }
            _ => Ok(()),
        }
    }

    /// The single exit point: success and failure produce the same shape.
    pub fn finish(self, outcome: Result<GeneratedSystem, GenerationError>) -> SystemGenerationResult {
        let validation_levels_passed = self.levels_passed();
        let healing_applied = self.healing_applied();
        let total_execution_time = self.started.elapsed().as_secs_f64();

        let (generated_system, error_message, error_kind, failed_level) = match outcome {
            Ok(system) => (Some(system), None, None, None),
            Err(err) => (None, Some(err.to_string()), Some(err.kind()), err.level()),
        };

        SystemGenerationResult {
            successful: generated_system.is_some(),
            generated_system,
            validation_levels_passed,
            validation_results: self.results,
            healing_applied,
            total_execution_time,
            error_message,
            error_kind,
            failed_level,
            blueprint_path: self.source_path,
            timestamp: Utc::now(),
        }
    }
}
