use std::future::Future;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::blueprint::{Blueprint, Component};
use crate::collaborators::{BlueprintHealer, BlueprintValidator, CollaboratorError, CollaboratorSet};
use crate::config::{Config, Environment, TimeoutConfig};
use crate::dependency::{
    DependencyCategory, DependencyChecker, DependencyError, DependencyReport, DependencyStatus,
    describe_statuses,
};
use crate::error::GenerationError;
use crate::validation::{
    GeneratedSystem, HealingResult, HealingType, SystemGenerationResult, ValidationFailure,
    ValidationLevel, ValidationResult,
};

use super::run::GenerationRun;
use super::types::{CancelToken, GenerationEvent, HealTarget};

/// Metadata flag on a level 4 result produced because the LLM could not be reached.
pub const LLM_UNAVAILABLE: &str = "llm_unavailable";

/// Drives a blueprint through preflight, the four validation tiers and
/// finalization.
///
/// Tiers run strictly in order. Each tier gets at most one healing pass (per
/// component at level 2) followed by one re-validation; a second failure ends
/// the run. One instance drives one run at a time.
#[derive(Clone)]
pub struct ValidationDrivenOrchestrator {
    collaborators: CollaboratorSet,
    checker: DependencyChecker,
    timeouts: TimeoutConfig,
    events: Option<Sender<GenerationEvent>>,
    cancel: CancelToken,
}

impl ValidationDrivenOrchestrator {
    pub fn new(
        collaborators: CollaboratorSet,
        checker: DependencyChecker,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            collaborators,
            checker,
            timeouts,
            events: None,
            cancel: CancelToken::new(),
        }
    }

    /// Build every collaborator and check up front. A missing collaborator
    /// fails here, not mid-run.
    pub fn from_config(config: &Config, env: Environment) -> Result<Self, GenerationError> {
        let collaborators = CollaboratorSet::from_config(config, env.clone())?;
        let checker = DependencyChecker::from_config(&config.dependencies, env).map_err(|e| {
            GenerationError::CollaboratorUnavailable {
                role: "dependency_checker".into(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self::new(collaborators, checker, config.timeouts))
    }

    pub fn with_events(mut self, events: Sender<GenerationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Every dependency status, for display. Never fails.
    pub async fn get_dependency_report(&self, blueprint: &Blueprint) -> DependencyReport {
        self.checker.report(blueprint).await
    }

    /// Run the whole state machine. Expected failures come back inside the
    /// result; nothing is lost from the audit trail.
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    pub async fn generate_system_with_validation(&self, blueprint: &Blueprint) -> SystemGenerationResult {
        let mut run = GenerationRun::new(blueprint);
        let outcome = self.drive(&mut run).await;
        match &outcome {
            Ok(system) => info!(
                levels_passed = run.levels_passed(),
                healing_applied = run.healing_applied(),
                output_dir = %system.output_dir.display(),
                "generation succeeded"
            ),
            Err(err) => error!(
                kind = ?err.kind(),
                levels_passed = run.levels_passed(),
                "generation failed: {err}"
            ),
        }
        let result = run.finish(outcome);
        self.emit(GenerationEvent::Completed(Box::new(result.clone())));
        result
    }

    async fn drive(&self, run: &mut GenerationRun) -> Result<GeneratedSystem, GenerationError> {
        self.check_cancelled(run)?;
        self.preflight(run.blueprint()).await?;
        for level in ValidationLevel::ALL {
            self.check_cancelled(run)?;
            self.execute_tier(run, level).await?;
        }
        self.check_cancelled(run)?;
        self.finalize(run).await
    }

    async fn preflight(&self, blueprint: &Blueprint) -> Result<(), GenerationError> {
        self.emit(GenerationEvent::PreflightStarted);
        let report = self.checker.report(blueprint).await;
        let missing: Vec<DependencyStatus> = report.missing().into_iter().cloned().collect();
        self.emit(GenerationEvent::PreflightFinished {
            available: report.statuses.iter().filter(|s| s.available).count(),
            missing: missing.len(),
        });
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DependencyError::Missing { missing }.into())
        }
    }

    /// Execute one tier against the run's working blueprint.
    ///
    /// Fails with [`GenerationError::ValidationSequence`] before touching any
    /// validator if the previous tier has not passed.
    #[instrument(skip_all, fields(level = %level))]
    pub async fn execute_tier(
        &self,
        run: &mut GenerationRun,
        level: ValidationLevel,
    ) -> Result<(), GenerationError> {
        run.ensure_ready(level)?;
        self.emit(GenerationEvent::TierStarted(level));
        info!("tier started");

        let outcome = match level {
            ValidationLevel::Framework => self.framework_tier(run).await,
            ValidationLevel::ComponentLogic => self.component_tier(run).await,
            ValidationLevel::SystemIntegration => {
                self.blueprint_tier(
                    run,
                    level,
                    self.collaborators.integration.as_ref(),
                    self.collaborators.config_regenerator.as_ref(),
                    HealingType::ConfigRegeneration,
                )
                .await
            }
            ValidationLevel::Semantic => self.semantic_tier(run).await,
        };

        let passed = outcome.is_ok();
        if passed {
            info!("tier passed");
        } else {
            warn!("tier failed");
        }
        self.emit(GenerationEvent::TierFinished { level, passed });
        outcome
    }

    /// Level 1 has no healing path.
    async fn framework_tier(&self, run: &mut GenerationRun) -> Result<(), GenerationError> {
        let level = ValidationLevel::Framework;
        let result = self
            .validate_blueprint(run, self.collaborators.framework.as_ref(), level, run.blueprint())
            .await?;
        let passed = result.passed;
        let failures = result.failures.clone();
        run.record(result);
        if passed {
            Ok(())
        } else {
            Err(GenerationError::tier_failed(level, failures))
        }
    }

    /// Level 2: validate every component, then heal each failing component
    /// independently and re-validate it.
    async fn component_tier(&self, run: &mut GenerationRun) -> Result<(), GenerationError> {
        let level = ValidationLevel::ComponentLogic;
        let components = run.blueprint().components.clone();

        let started = Instant::now();
        let mut failing: Vec<(usize, Vec<ValidationFailure>)> = Vec::new();
        for (index, component) in components.iter().enumerate() {
            self.check_cancelled(run)?;
            let failures = self.validate_component(run, component).await?;
            if !failures.is_empty() {
                warn!(
                    component = %component.name,
                    failures = failures.len(),
                    "component failed validation"
                );
                failing.push((index, failures));
            }
        }

        let failures: Vec<ValidationFailure> = failing
            .iter()
            .flat_map(|(_, failures)| failures.iter().cloned())
            .collect();
        let mut first = ValidationResult::from_failures(level, failures.clone())
            .with_metadata("components_checked", components.len());
        first.execution_time = started.elapsed().as_secs_f64();
        run.record(first);

        if failing.is_empty() {
            return Ok(());
        }
        if !failures.iter().any(|f| f.healing_candidate) {
            return Err(GenerationError::tier_failed(level, failures));
        }

        let started = Instant::now();
        let mut healing_results = Vec::new();
        let mut remaining = Vec::new();
        let mut interrupted = None;
        let mut pending = failing.into_iter();
        while let Some((index, failures)) = pending.next() {
            let component = &components[index];
            if !failures.iter().any(|f| f.healing_candidate) {
                remaining.extend(failures);
                continue;
            }

            let outcome = self.heal_component(run, component, &failures).await;
            let healing = match outcome {
                Ok(healing) => healing,
                Err(err) => {
                    remaining.extend(failures);
                    interrupted = Some(err);
                    break;
                }
            };
            match healing
                .healed_component
                .clone()
                .filter(|_| healing.healing_successful)
            {
                Some(healed) => {
                    let post = self.validate_component(run, &healed).await;
                    match post {
                        Ok(post) if post.is_empty() => {
                            info!(component = %component.name, "component healed");
                            run.replace_component(index, healed);
                        }
                        Ok(post) => remaining.extend(post),
                        Err(err) => {
                            remaining.extend(failures);
                            interrupted = Some(err);
                        }
                    }
                }
                None => {
                    remaining.extend(failures);
                    remaining.push(healing_failure(level, &healing).for_component(&component.name));
                }
            }
            healing_results.push(healing);
            if interrupted.is_some() {
                break;
            }
        }
        // Components never reached keep their original failures.
        remaining.extend(pending.flat_map(|(_, failures)| failures));

        if healing_results.is_empty()
            && let Some(err) = interrupted.take()
        {
            return Err(err);
        }

        let mut retry = ValidationResult::from_failures(level, remaining.clone());
        retry.healing_applied = true;
        retry.healing_results = healing_results;
        retry.execution_time = started.elapsed().as_secs_f64();
        run.record(retry);

        if let Some(err) = interrupted {
            warn!("component healing interrupted: {err}");
            return Err(err);
        }
        if remaining.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::healing_failed(level, remaining))
        }
    }

    /// Level 4 re-checks the LLM first so an outage since preflight is
    /// reported as a semantic failure.
    async fn semantic_tier(&self, run: &mut GenerationRun) -> Result<(), GenerationError> {
        let level = ValidationLevel::Semantic;
        let started = Instant::now();
        if let Err(DependencyError::Missing { missing }) = self
            .checker
            .verify(DependencyCategory::Llm, run.blueprint())
            .await
        {
            let failures = vec![ValidationFailure::new(
                level,
                format!("LLM unavailable: {}", describe_statuses(&missing)),
            )];
            let mut result = ValidationResult::from_failures(level, failures.clone())
                .with_metadata(LLM_UNAVAILABLE, true);
            result.execution_time = started.elapsed().as_secs_f64();
            run.record(result);
            return Err(GenerationError::SemanticValidation {
                failures,
                llm_unavailable: true,
            });
        }

        self.blueprint_tier(
            run,
            level,
            self.collaborators.semantic.as_ref(),
            self.collaborators.semantic_healer.as_ref(),
            HealingType::Semantic,
        )
        .await
    }

    /// Levels 3 and 4: validate the whole blueprint, heal it once, re-validate.
    async fn blueprint_tier(
        &self,
        run: &mut GenerationRun,
        level: ValidationLevel,
        validator: &dyn BlueprintValidator,
        healer: &dyn BlueprintHealer,
        healing_type: HealingType,
    ) -> Result<(), GenerationError> {
        let first = self
            .validate_blueprint(run, validator, level, run.blueprint())
            .await?;
        let passed = first.passed;
        let failures = first.failures.clone();
        let healable = first.has_healing_candidates();
        let llm_down = level == ValidationLevel::Semantic && llm_unavailable(&first);
        run.record(first);

        if passed {
            return Ok(());
        }
        if llm_down {
            return Err(GenerationError::SemanticValidation {
                failures,
                llm_unavailable: true,
            });
        }
        if !healable {
            return Err(GenerationError::tier_failed(level, failures));
        }

        let healing = self
            .heal_blueprint(run, level, healer, healing_type, &failures)
            .await?;
        let started = Instant::now();
        let Some(healed) = healing
            .healed_blueprint
            .clone()
            .filter(|_| healing.healing_successful)
        else {
            let mut remaining = failures;
            remaining.push(healing_failure(level, &healing));
            let mut retry = ValidationResult::from_failures(level, remaining.clone());
            retry.healing_applied = true;
            retry.healing_results = vec![healing];
            retry.execution_time = started.elapsed().as_secs_f64();
            run.record(retry);
            return Err(GenerationError::healing_failed(level, remaining));
        };

        let outcome = self.validate_blueprint(run, validator, level, &healed).await;
        let mut retry = match outcome {
            Ok(retry) => retry,
            Err(err) => {
                // Keep the heal in the audit trail even though its re-check never finished.
                let mut partial = ValidationResult::from_failures(level, failures);
                partial.healing_applied = true;
                partial.healing_results = vec![healing];
                partial.execution_time = started.elapsed().as_secs_f64();
                run.record(partial);
                return Err(err);
            }
        };
        retry.healing_applied = true;
        retry.healing_results = vec![healing];
        let passed = retry.passed;
        let failures = retry.failures.clone();
        let llm_down = level == ValidationLevel::Semantic && llm_unavailable(&retry);
        run.record(retry);

        if passed {
            info!("blueprint healed");
            run.replace_blueprint(healed);
            Ok(())
        } else if llm_down {
            Err(GenerationError::SemanticValidation {
                failures,
                llm_unavailable: true,
            })
        } else {
            Err(GenerationError::healing_failed(level, failures))
        }
    }

    /// Validator errors and timeouts become failed, non-healable results.
    /// Only cancellation is an error.
    async fn validate_blueprint(
        &self,
        run: &GenerationRun,
        validator: &dyn BlueprintValidator,
        level: ValidationLevel,
        blueprint: &Blueprint,
    ) -> Result<ValidationResult, GenerationError> {
        let started = Instant::now();
        let limit = self.timeouts.validator;
        let outcome = self
            .bounded(run, limit.duration(), validator.validate(blueprint))
            .await?;
        let mut result = match outcome {
            Ok(Ok(mut result)) => {
                result.level = level;
                result
            }
            Ok(Err(err)) => {
                warn!(%level, "validator failed: {err}");
                let llm = matches!(err, CollaboratorError::LlmUnavailable(_));
                let result = ValidationResult::from_failures(
                    level,
                    vec![ValidationFailure::new(level, format!("validator failed: {err}"))],
                );
                if llm {
                    result.with_metadata(LLM_UNAVAILABLE, true)
                } else {
                    result
                }
            }
            Err(_) => ValidationResult::from_failures(
                level,
                vec![ValidationFailure::new(
                    level,
                    format!("validator timed out after {}s", limit.0),
                )],
            ),
        };
        result.execution_time = started.elapsed().as_secs_f64();
        Ok(result)
    }

    /// Failures for one component, each attributed to it. Empty means it passed.
    async fn validate_component(
        &self,
        run: &GenerationRun,
        component: &Component,
    ) -> Result<Vec<ValidationFailure>, GenerationError> {
        let level = ValidationLevel::ComponentLogic;
        let limit = self.timeouts.validator;
        let dict = component.to_validation_dict();
        let outcome = self
            .bounded(
                run,
                limit.duration(),
                self.collaborators.component_logic.validate_component(&dict),
            )
            .await?;

        let failures = match outcome {
            Ok(Ok(result)) if result.passed => Vec::new(),
            Ok(Ok(result)) if result.failures.is_empty() => {
                vec![ValidationFailure::new(level, "component rejected without details")]
            }
            Ok(Ok(result)) => result.failures,
            Ok(Err(err)) => {
                vec![ValidationFailure::new(level, format!("component validator failed: {err}"))]
            }
            Err(_) => vec![ValidationFailure::new(
                level,
                format!("component validator timed out after {}s", limit.0),
            )],
        };
        Ok(failures
            .into_iter()
            .map(|f| match f.component_name {
                Some(_) => f,
                None => f.for_component(&component.name),
            })
            .collect())
    }

    async fn heal_component(
        &self,
        run: &GenerationRun,
        component: &Component,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, GenerationError> {
        let level = ValidationLevel::ComponentLogic;
        let target = HealTarget::Component(component.name.clone());
        self.emit(GenerationEvent::HealingStarted {
            level,
            target: target.clone(),
        });
        info!(%target, failures = failures.len(), "healing");

        let started = Instant::now();
        let outcome = self
            .bounded(
                run,
                self.timeouts.healer.duration(),
                self.collaborators.ast_healer.heal_component(component, failures),
            )
            .await?;
        let mut healing = self.settle_healing(HealingType::Ast, outcome)?;
        if healing.healing_successful && healing.healed_component.is_none() {
            healing.healing_successful = false;
            healing.error_message = Some("healer reported success without a healed component".into());
        }
        healing.execution_time = started.elapsed().as_secs_f64();

        self.emit(GenerationEvent::HealingFinished {
            level,
            target,
            successful: healing.healing_successful,
        });
        Ok(healing)
    }

    async fn heal_blueprint(
        &self,
        run: &GenerationRun,
        level: ValidationLevel,
        healer: &dyn BlueprintHealer,
        healing_type: HealingType,
        failures: &[ValidationFailure],
    ) -> Result<HealingResult, GenerationError> {
        let blueprint = run.blueprint();
        let target = HealTarget::Blueprint(blueprint.name.clone());
        self.emit(GenerationEvent::HealingStarted {
            level,
            target: target.clone(),
        });
        info!(%target, kind = healing_type.as_str(), failures = failures.len(), "healing");

        let started = Instant::now();
        let outcome = self
            .bounded(
                run,
                self.timeouts.healer.duration(),
                healer.heal_blueprint(blueprint, failures),
            )
            .await?;
        let mut healing = self.settle_healing(healing_type, outcome)?;
        if healing.healing_successful && healing.healed_blueprint.is_none() {
            healing.healing_successful = false;
            healing.error_message = Some("healer reported success without a healed blueprint".into());
        }
        healing.execution_time = started.elapsed().as_secs_f64();

        self.emit(GenerationEvent::HealingFinished {
            level,
            target,
            successful: healing.healing_successful,
        });
        Ok(healing)
    }

    /// An unavailable healer is fatal; any other healer error is a failed heal.
    fn settle_healing(
        &self,
        healing_type: HealingType,
        outcome: Result<Result<HealingResult, CollaboratorError>, Elapsed>,
    ) -> Result<HealingResult, GenerationError> {
        match outcome {
            Ok(Ok(mut result)) => {
                result.healing_type = healing_type;
                Ok(result)
            }
            Ok(Err(err @ CollaboratorError::Unavailable { .. })) => Err(err.into()),
            Ok(Err(err)) => {
                warn!(kind = healing_type.as_str(), "healer failed: {err}");
                Ok(HealingResult::failed(healing_type, err.to_string()))
            }
            Err(_) => Ok(HealingResult::failed(
                healing_type,
                format!("healer timed out after {}s", self.timeouts.healer.0),
            )),
        }
    }

    /// Runs once, after level 4, on the healed blueprint.
    async fn finalize(&self, run: &GenerationRun) -> Result<GeneratedSystem, GenerationError> {
        if !run.level_passed(ValidationLevel::Semantic) {
            return Err(GenerationError::Finalization {
                detail: "semantic validation has not passed".into(),
            });
        }
        self.emit(GenerationEvent::Finalizing);
        info!("finalizing");

        let limit = self.timeouts.finalizer;
        let outcome = self
            .bounded(
                run,
                limit.duration(),
                self.collaborators.finalizer.finalize(run.blueprint()),
            )
            .await?;
        match outcome {
            Ok(Ok(system)) => Ok(system),
            Ok(Err(err @ CollaboratorError::Unavailable { .. })) => Err(err.into()),
            Ok(Err(err)) => Err(GenerationError::Finalization {
                detail: err.to_string(),
            }),
            Err(_) => Err(GenerationError::Finalization {
                detail: format!("finalizer timed out after {}s", limit.0),
            }),
        }
    }

    fn check_cancelled(&self, run: &GenerationRun) -> Result<(), GenerationError> {
        if self.cancel.is_cancelled() {
            return Err(self.cancelled(run));
        }
        Ok(())
    }

    fn cancelled(&self, run: &GenerationRun) -> GenerationError {
        warn!(levels_passed = run.levels_passed(), "generation cancelled");
        GenerationError::Cancelled {
            completed_levels: run.levels_passed(),
        }
    }

    /// Run a collaborator call under its time limit, abandoning it as soon as
    /// the run is cancelled. Dropping the call kills any child process.
    async fn bounded<F: Future>(
        &self,
        run: &GenerationRun,
        limit: Duration,
        call: F,
    ) -> Result<Result<F::Output, Elapsed>, GenerationError> {
        tokio::select! {
            outcome = timeout(limit, call) => Ok(outcome),
            () = self.cancel.cancelled() => Err(self.cancelled(run)),
        }
    }

    fn emit(&self, event: GenerationEvent) {
        if let Some(tx) = &self.events {
            // Receiver may be dropped; ignore send errors.
            let _ = tx.send(event);
        }
    }
}

fn llm_unavailable(result: &ValidationResult) -> bool {
    result
        .metadata
        .get(LLM_UNAVAILABLE)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// The extra failure recorded when a heal produced nothing usable.
fn healing_failure(level: ValidationLevel, healing: &HealingResult) -> ValidationFailure {
    let failure_type = level
        .healing_failure_type()
        .unwrap_or_else(|| level.validation_failure_type());
    let reason = healing
        .error_message
        .as_deref()
        .unwrap_or("healer produced no healed artifact");
    ValidationFailure::of_type(
        level,
        failure_type,
        format!("{} healing failed: {reason}", healing.healing_type.as_str()),
    )
}

/// Launch a generation run on a background tokio task.
///
/// Returns a receiver that streams [`GenerationEvent`]s. The final event is
/// always [`GenerationEvent::Completed`].
pub fn spawn_generation(
    orchestrator: &ValidationDrivenOrchestrator,
    blueprint: Blueprint,
    cancel: CancelToken,
) -> Receiver<GenerationEvent> {
    let (tx, rx) = mpsc::channel();
    let orchestrator = orchestrator
        .clone()
        .with_events(tx)
        .with_cancel_token(cancel);
    tokio::spawn(async move {
        orchestrator.generate_system_with_validation(&blueprint).await;
    });
    rx
}
