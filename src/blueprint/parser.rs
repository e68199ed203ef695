use std::path::Path;

use anyhow::{Context, Result, bail};

use super::types::Blueprint;

/// Parse a blueprint document (YAML, or JSON as a YAML subset).
///
/// Accepts either a bare blueprint mapping or one nested under a top-level
/// `system:` key.
pub fn parse_blueprint(raw: &str) -> Result<Blueprint> {
    let doc: serde_yaml::Value = serde_yaml::from_str(raw).context("blueprint is not valid YAML")?;
    let doc = match doc {
        serde_yaml::Value::Mapping(mut mapping) => match mapping.remove("system") {
            Some(inner @ serde_yaml::Value::Mapping(_)) => inner,
            Some(_) => bail!("`system` must be a mapping"),
            None => serde_yaml::Value::Mapping(mapping),
        },
        serde_yaml::Value::Null => bail!("blueprint is empty"),
        _ => bail!("blueprint must be a mapping at the top level"),
    };
    let blueprint: Blueprint =
        serde_yaml::from_value(doc).context("blueprint does not match the expected shape")?;
    if blueprint.name.trim().is_empty() {
        bail!("blueprint name cannot be blank");
    }
    Ok(blueprint)
}

/// Read and parse a blueprint file, recording where it came from.
pub fn load_blueprint(path: &Path) -> Result<Blueprint> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read blueprint {}", path.display()))?;
    let mut blueprint =
        parse_blueprint(&raw).with_context(|| format!("invalid blueprint {}", path.display()))?;
    blueprint.source_path = Some(path.to_path_buf());
    Ok(blueprint)
}

impl Blueprint {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        parse_blueprint(raw)
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_blueprint(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{ComponentType, ServiceKind};

    const PIPELINE: &str = r#"
name: orders
description: Order ingestion
components:
  - name: intake
    type: Source
    outputs:
      - name: orders
        schema: Order
    behavioral_dependencies:
      - name: catalog
        service_type: http
        endpoint: http://catalog.local/health
      - broker
  - name: store
    type: Store
    inputs:
      - name: orders
        schema: Order
    config:
      api_endpoints:
        - https://audit.local/ping
        - url: amqp://queue.local
bindings:
  - from_component: intake
    from_port: orders
    to_components: [store]
    to_port: orders
"#;

    #[test]
    fn parses_components_and_bindings() {
        let bp = parse_blueprint(PIPELINE).unwrap();
        assert_eq!(bp.name, "orders");
        assert_eq!(bp.components.len(), 2);
        assert_eq!(bp.components[0].component_type, ComponentType::Source);
        assert_eq!(bp.bindings[0].to_components, vec!["store"]);
        assert!(bp.components[0].inputs.is_empty());
        assert!(bp.source_path.is_none());
    }

    #[test]
    fn absent_and_null_collections_are_empty() {
        let raw = "name: bare\ncomponents:\n  - name: a\n    type: Sink\n    inputs:\n    config:\nbindings:\n";
        let bp = parse_blueprint(raw).unwrap();
        let sink = &bp.components[0];
        assert!(sink.inputs.is_empty());
        assert!(sink.config.is_empty());
        assert!(sink.behavioral_dependencies.is_empty());
        assert!(bp.bindings.is_empty());
    }

    #[test]
    fn accepts_system_wrapper_and_single_binding_target() {
        let raw = r#"
system:
  name: wrapped
  components:
    - {name: a, type: Source}
    - {name: b, type: APIEndpoint}
  bindings:
    - {from_component: a, from_port: out, to_component: b, to_port: in}
"#;
        let bp = parse_blueprint(raw).unwrap();
        assert_eq!(bp.name, "wrapped");
        assert_eq!(bp.components[1].component_type, ComponentType::ApiEndpoint);
        assert_eq!(bp.bindings[0].to_components, vec!["b"]);
    }

    #[test]
    fn rejects_unknown_component_type() {
        let raw = "name: x\ncomponents:\n  - name: a\n    type: Teleporter\n";
        assert!(parse_blueprint(raw).is_err());
    }

    #[test]
    fn rejects_blank_name_and_non_mapping() {
        assert!(parse_blueprint("name: ''\n").is_err());
        assert!(parse_blueprint("- a\n- b\n").is_err());
        assert!(parse_blueprint("").is_err());
    }

    #[test]
    fn declared_services_cover_dependencies_and_endpoints() {
        let bp = parse_blueprint(PIPELINE).unwrap();
        let services = bp.declared_services();
        assert_eq!(services.len(), 4);
        assert_eq!(
            services[0].kind,
            ServiceKind::Http {
                url: "http://catalog.local/health".into()
            }
        );
        assert!(matches!(services[1].kind, ServiceKind::Other { .. }));
        assert_eq!(services[2].component, "store");
        assert!(matches!(services[2].kind, ServiceKind::Http { .. }));
        assert_eq!(
            services[3].kind,
            ServiceKind::Other {
                service_type: "amqp".into()
            }
        );
    }

    #[test]
    fn validation_dict_uses_fixed_keys() {
        let bp = parse_blueprint(PIPELINE).unwrap();
        let dict = bp.components[0].to_validation_dict();
        for key in [
            "name",
            "type",
            "description",
            "config",
            "inputs",
            "outputs",
            "behavioral_dependencies",
        ] {
            assert!(dict.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(dict["type"], "Source");
        assert_eq!(dict["outputs"][0]["schema"], "Order");
        assert_eq!(dict["outputs"][0]["required"], true);
    }

    #[test]
    fn load_records_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.yaml");
        std::fs::write(&path, PIPELINE).unwrap();
        let bp = load_blueprint(&path).unwrap();
        assert_eq!(bp.source_path.as_deref(), Some(path.as_path()));
    }
}
