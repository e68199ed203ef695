use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

/// Deserialize a collection that may be absent, `null`, or empty into its default.
///
/// YAML writes `inputs:` with no value as `null`; both that and a missing key
/// normalize to an empty collection.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The closed set of component kinds a blueprint may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Source,
    Transformer,
    Sink,
    Model,
    Store,
    #[serde(rename = "APIEndpoint", alias = "ApiEndpoint")]
    ApiEndpoint,
    Controller,
    Router,
    StreamProcessor,
    Accumulator,
    Filter,
    WebSocket,
    Aggregator,
}

impl ComponentType {
    pub const ALL: [ComponentType; 13] = [
        ComponentType::Source,
        ComponentType::Transformer,
        ComponentType::Sink,
        ComponentType::Model,
        ComponentType::Store,
        ComponentType::ApiEndpoint,
        ComponentType::Controller,
        ComponentType::Router,
        ComponentType::StreamProcessor,
        ComponentType::Accumulator,
        ComponentType::Filter,
        ComponentType::WebSocket,
        ComponentType::Aggregator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Source => "Source",
            ComponentType::Transformer => "Transformer",
            ComponentType::Sink => "Sink",
            ComponentType::Model => "Model",
            ComponentType::Store => "Store",
            ComponentType::ApiEndpoint => "APIEndpoint",
            ComponentType::Controller => "Controller",
            ComponentType::Router => "Router",
            ComponentType::StreamProcessor => "StreamProcessor",
            ComponentType::Accumulator => "Accumulator",
            ComponentType::Filter => "Filter",
            ComponentType::WebSocket => "WebSocket",
            ComponentType::Aggregator => "Aggregator",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An input or output port on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(default)]
    pub schema: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

/// Transport family of a declared external service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    Http { url: String },
    /// Declared as HTTP but with nothing to probe.
    HttpWithoutEndpoint,
    Other { service_type: String },
}

/// A component-declared need for an external service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDependency")]
pub struct BehavioralDependency {
    pub name: String,
    pub service_type: String,
    pub endpoint: Option<String>,
    pub required: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDependency {
    Name(String),
    Full {
        name: String,
        #[serde(default, alias = "type")]
        service_type: Option<String>,
        #[serde(default, alias = "url")]
        endpoint: Option<String>,
        #[serde(default = "default_true")]
        required: bool,
    },
}

impl From<RawDependency> for BehavioralDependency {
    fn from(raw: RawDependency) -> Self {
        match raw {
            RawDependency::Name(name) => BehavioralDependency {
                name,
                service_type: "unknown".into(),
                endpoint: None,
                required: true,
            },
            RawDependency::Full {
                name,
                service_type,
                endpoint,
                required,
            } => {
                // A URL without an explicit type still tells us the transport.
                let service_type = service_type
                    .or_else(|| endpoint.as_deref().and_then(scheme_of))
                    .unwrap_or_else(|| "unknown".into());
                BehavioralDependency {
                    name,
                    service_type: service_type.to_ascii_lowercase(),
                    endpoint,
                    required,
                }
            }
        }
    }
}

fn scheme_of(endpoint: &str) -> Option<String> {
    endpoint
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
}

impl BehavioralDependency {
    pub fn kind(&self) -> ServiceKind {
        match (self.service_type.as_str(), &self.endpoint) {
            ("http" | "https" | "rest" | "api", Some(url)) => ServiceKind::Http { url: url.clone() },
            ("http" | "https" | "rest" | "api", None) => ServiceKind::HttpWithoutEndpoint,
            _ => ServiceKind::Other {
                service_type: self.service_type.clone(),
            },
        }
    }
}

/// One component of a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub config: Map<String, Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub behavioral_dependencies: Vec<BehavioralDependency>,
    #[serde(default, deserialize_with = "nullable")]
    pub inputs: Vec<Port>,
    #[serde(default, deserialize_with = "nullable")]
    pub outputs: Vec<Port>,
}

impl Component {
    pub fn new(name: impl Into<String>, component_type: ComponentType) -> Self {
        Self {
            name: name.into(),
            component_type,
            description: String::new(),
            config: Map::new(),
            behavioral_dependencies: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// URLs listed under `config.api_endpoints`, as strings or `{url: ...}` maps.
    pub fn api_endpoints(&self) -> Vec<String> {
        let Some(Value::Array(entries)) = self.config.get("api_endpoints") else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match entry {
                Value::String(url) => Some(url.clone()),
                Value::Object(map) => map.get("url").and_then(Value::as_str).map(String::from),
                _ => None,
            })
            .collect()
    }

    /// Flatten the component into the fixed-key shape component validators consume.
    pub fn to_validation_dict(&self) -> Value {
        let ports = |ports: &[Port]| -> Vec<Value> {
            ports
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "schema": p.schema,
                        "required": p.required,
                        "description": p.description,
                    })
                })
                .collect()
        };
        let dependencies: Vec<Value> = self
            .behavioral_dependencies
            .iter()
            .map(|d| {
                json!({
                    "name": d.name,
                    "service_type": d.service_type,
                    "endpoint": d.endpoint,
                    "required": d.required,
                })
            })
            .collect();

        json!({
            "name": self.name,
            "type": self.component_type.as_str(),
            "description": self.description,
            "config": Value::Object(self.config.clone()),
            "inputs": ports(&self.inputs),
            "outputs": ports(&self.outputs),
            "behavioral_dependencies": dependencies,
        })
    }
}

/// A directed connection from one component's output to other components' inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub from_component: String,
    pub from_port: String,
    #[serde(alias = "to_component", deserialize_with = "one_or_many")]
    pub to_components: Vec<String>,
    pub to_port: String,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

/// An external service some component needs, flattened for dependency probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredService {
    pub name: String,
    pub component: String,
    pub kind: ServiceKind,
    pub required: bool,
}

/// Declarative description of a system: its components and the bindings between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub version: String,
    #[serde(default, deserialize_with = "nullable")]
    pub components: Vec<Component>,
    #[serde(default, deserialize_with = "nullable")]
    pub bindings: Vec<Binding>,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: String::new(),
            components,
            bindings: Vec::new(),
            source_path: None,
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Every external service the blueprint declares, from behavioral
    /// dependencies and `config.api_endpoints`, in component order.
    pub fn declared_services(&self) -> Vec<DeclaredService> {
        let mut services = Vec::new();
        for component in &self.components {
            for dep in &component.behavioral_dependencies {
                services.push(DeclaredService {
                    name: dep.name.clone(),
                    component: component.name.clone(),
                    kind: dep.kind(),
                    required: dep.required,
                });
            }
            for url in component.api_endpoints() {
                let kind = match scheme_of(&url).as_deref() {
                    Some("http" | "https") => ServiceKind::Http { url: url.clone() },
                    Some(other) => ServiceKind::Other {
                        service_type: other.to_string(),
                    },
                    None => ServiceKind::Other {
                        service_type: "unknown".into(),
                    },
                };
                services.push(DeclaredService {
                    name: url,
                    component: component.name.clone(),
                    kind,
                    required: true,
                });
            }
        }
        services
    }
}
