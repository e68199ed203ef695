// Blueprint model: the read-only input to generation.
mod discovery;
mod parser;
mod types;

pub use discovery::{discover_blueprints, normalize_blueprint_path};
pub use parser::{load_blueprint, parse_blueprint};
pub use types::{
    Binding, BehavioralDependency, Blueprint, Component, ComponentType, DeclaredService, Port,
    ServiceKind,
};
