use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::blueprint::{Blueprint, Component, ComponentType, Port};
use crate::validation::{ValidationFailure, ValidationLevel, ValidationResult};

use super::types::{BlueprintValidator, CollaboratorError, ComponentValidator};

/// Level 1: the blueprint is well-formed enough to reason about at all.
/// Nothing found here is healable.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

#[async_trait]
impl BlueprintValidator for StructuralValidator {
    async fn validate(&self, blueprint: &Blueprint) -> Result<ValidationResult, CollaboratorError> {
        let level = ValidationLevel::Framework;
        let mut failures = Vec::new();

        if blueprint.components.is_empty() {
            failures.push(ValidationFailure::new(level, "blueprint declares no components"));
        }

        let mut seen = HashSet::new();
        for component in &blueprint.components {
            if component.name.trim().is_empty() {
                failures.push(ValidationFailure::new(
                    level,
                    format!("a {} component has a blank name", component.component_type),
                ));
            } else if !seen.insert(component.name.as_str()) {
                failures.push(
                    ValidationFailure::new(level, "component name is declared more than once")
                        .for_component(&component.name),
                );
            }
        }

        for binding in &blueprint.bindings {
            match blueprint.component(&binding.from_component) {
                None => failures.push(ValidationFailure::new(
                    level,
                    format!("binding source `{}` does not exist", binding.from_component),
                )),
                Some(source) if !has_port(&source.outputs, &binding.from_port) => failures.push(
                    ValidationFailure::new(
                        level,
                        format!("binding source port `{}` is not an output", binding.from_port),
                    )
                    .for_component(&source.name),
                ),
                Some(_) => {}
            }
            if binding.to_components.is_empty() {
                failures.push(ValidationFailure::new(
                    level,
                    format!(
                        "binding from `{}.{}` has no target",
                        binding.from_component, binding.from_port
                    ),
                ));
            }
            for target in &binding.to_components {
                match blueprint.component(target) {
                    None => failures.push(ValidationFailure::new(
                        level,
                        format!("binding target `{target}` does not exist"),
                    )),
                    Some(component) if !has_port(&component.inputs, &binding.to_port) => failures
                        .push(
                            ValidationFailure::new(
                                level,
                                format!("binding target port `{}` is not an input", binding.to_port),
                            )
                            .for_component(target),
                        ),
                    Some(_) => {}
                }
            }
        }

        Ok(ValidationResult::from_failures(level, failures)
            .with_metadata("components", blueprint.components.len())
            .with_metadata("bindings", blueprint.bindings.len()))
    }
}

fn has_port(ports: &[Port], name: &str) -> bool {
    ports.iter().any(|p| p.name == name)
}

/// Level 2: each component honours the port contract of its type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentContractValidator;

impl ComponentContractValidator {
    fn check(component: &Component) -> Vec<String> {
        let mut problems = Vec::new();
        let inputs = component.inputs.len();
        let outputs = component.outputs.len();

        match component.component_type {
            ComponentType::Source => {
                if outputs == 0 {
                    problems.push("a Source must declare at least one output".to_string());
                }
                if component.inputs.iter().any(|p| p.required) {
                    problems.push("a Source cannot have required inputs".to_string());
                }
            }
            ComponentType::Sink => {
                if inputs == 0 {
                    problems.push("a Sink must declare at least one input".to_string());
                }
            }
            ComponentType::Transformer
            | ComponentType::Filter
            | ComponentType::StreamProcessor
            | ComponentType::Aggregator
            | ComponentType::Accumulator => {
                if inputs == 0 || outputs == 0 {
                    problems.push(format!(
                        "a {} needs both inputs and outputs",
                        component.component_type
                    ));
                }
            }
            ComponentType::Router => {
                if inputs == 0 || outputs < 2 {
                    problems.push(
                        "a Router needs at least one input and two outputs".to_string(),
                    );
                }
            }
            ComponentType::Model
            | ComponentType::Store
            | ComponentType::ApiEndpoint
            | ComponentType::Controller
            | ComponentType::WebSocket => {}
        }

        for (direction, ports) in [("input", &component.inputs), ("output", &component.outputs)] {
            let mut names = HashSet::new();
            for port in ports {
                if port.name.trim().is_empty() {
                    problems.push(format!("an {direction} port has a blank name"));
                    continue;
                }
                if !names.insert(port.name.as_str()) {
                    problems.push(format!("{direction} port `{}` is declared twice", port.name));
                }
                if port.schema.trim().is_empty() {
                    problems.push(format!("{direction} port `{}` has no schema", port.name));
                }
            }
        }
        problems
    }
}

#[async_trait]
impl ComponentValidator for ComponentContractValidator {
    async fn validate_component(
        &self,
        component: &Value,
    ) -> Result<ValidationResult, CollaboratorError> {
        let level = ValidationLevel::ComponentLogic;
        let name = component
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string();

        let failures = match serde_json::from_value::<Component>(component.clone()) {
            Ok(parsed) => Self::check(&parsed)
                .into_iter()
                .map(|problem| {
                    ValidationFailure::new(level, problem)
                        .for_component(&name)
                        .healable()
                })
                .collect(),
            Err(err) => vec![
                ValidationFailure::new(level, format!("component is malformed: {err}"))
                    .for_component(&name)
                    .healable(),
            ],
        };
        Ok(ValidationResult::from_failures(level, failures).with_metadata("component", name))
    }
}

/// Level 3: the components fit together through their bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BindingIntegrationValidator;

fn schemas_compatible(from: &str, to: &str) -> bool {
    let wildcard = |s: &str| s.is_empty() || s.eq_ignore_ascii_case("any") || s.eq_ignore_ascii_case("object");
    wildcard(from) || wildcard(to) || from == to
}

#[async_trait]
impl BlueprintValidator for BindingIntegrationValidator {
    async fn validate(&self, blueprint: &Blueprint) -> Result<ValidationResult, CollaboratorError> {
        let level = ValidationLevel::SystemIntegration;
        let mut failures = Vec::new();

        for binding in &blueprint.bindings {
            if binding.to_components.contains(&binding.from_component) {
                failures.push(
                    ValidationFailure::new(level, "component is bound to itself")
                        .for_component(&binding.from_component)
                        .healable(),
                );
            }
            let from_schema = blueprint
                .component(&binding.from_component)
                .and_then(|c| c.outputs.iter().find(|p| p.name == binding.from_port))
                .map(|p| p.schema.as_str());
            for target in &binding.to_components {
                let to_schema = blueprint
                    .component(target)
                    .and_then(|c| c.inputs.iter().find(|p| p.name == binding.to_port))
                    .map(|p| p.schema.as_str());
                if let (Some(from), Some(to)) = (from_schema, to_schema)
                    && !schemas_compatible(from, to)
                {
                    failures.push(
                        ValidationFailure::new(
                            level,
                            format!(
                                "`{}.{}` emits {from} but `{target}.{}` expects {to}",
                                binding.from_component, binding.from_port, binding.to_port
                            ),
                        )
                        .for_component(target)
                        .healable(),
                    );
                }
            }
        }

        for component in &blueprint.components {
            for input in component.inputs.iter().filter(|p| p.required) {
                let bound = blueprint.bindings.iter().any(|b| {
                    b.to_port == input.name && b.to_components.iter().any(|t| t == &component.name)
                });
                if !bound {
                    failures.push(
                        ValidationFailure::new(
                            level,
                            format!("required input `{}` is not bound", input.name),
                        )
                        .for_component(&component.name)
                        .healable(),
                    );
                }
            }
        }

        if blueprint.components.len() > 1 {
            for component in &blueprint.components {
                let connected = blueprint.bindings.iter().any(|b| {
                    b.from_component == component.name
                        || b.to_components.iter().any(|t| t == &component.name)
                });
                if !connected {
                    failures.push(
                        ValidationFailure::new(level, "component is not connected to the system")
                            .for_component(&component.name)
                            .healable(),
                    );
                }
            }
        }

        Ok(ValidationResult::from_failures(level, failures))
    }
}
