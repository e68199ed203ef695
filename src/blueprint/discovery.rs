use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use walkdir::WalkDir;

/// Resolve a blueprint path (from config or CLI) against the project root.
pub fn normalize_blueprint_path(root: &Path, blueprint: &str) -> Result<PathBuf> {
    if blueprint.trim().is_empty() {
        bail!("Blueprint path cannot be blank");
    }
    let path = PathBuf::from(blueprint);
    let absolute = if path.is_absolute() {
        path
    } else {
        root.join(&path)
    };
    if !absolute.is_file() {
        bail!("Blueprint file not found: {}", absolute.display());
    }
    absolute
        .canonicalize()
        .with_context(|| format!("cannot resolve {}", absolute.display()))
}

/// Walk the directory tree looking for blueprint files.
/// Returns a sorted list of paths relative to `root`.
pub fn discover_blueprints(root: &Path, max_depth: usize) -> Result<Vec<String>> {
    for name in ["blueprint.yaml", "blueprint.yml"] {
        if root.join(name).is_file() {
            return Ok(vec![name.to_string()]);
        }
    }

    let mut matches = Vec::new();
    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_skip(e));

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_yaml(path)
            && looks_like_blueprint(path)
            && let Ok(rel) = path.strip_prefix(root)
        {
            matches.push(rel.to_string_lossy().to_string());
        }
    }

    matches.sort();
    Ok(matches)
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml" | "YAML" | "YML")
    )
}

/// A blueprint is a mapping with a `components` key, optionally under `system`.
fn looks_like_blueprint(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(serde_yaml::Value::Mapping(mapping)) = serde_yaml::from_str::<serde_yaml::Value>(&content)
    else {
        return false;
    };
    if mapping.contains_key("components") {
        return true;
    }
    matches!(
        mapping.get("system"),
        Some(serde_yaml::Value::Mapping(inner)) if inner.contains_key("components")
    )
}

fn should_skip(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    matches!(
        entry.file_name().to_str().unwrap_or_default(),
        ".git" | ".tiergate" | "target" | "node_modules" | "generated" | ".venv" | "__pycache__"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = "name: t\ncomponents:\n  - name: a\n    type: Source\n";

    #[test]
    fn discover_finds_well_known_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blueprint.yaml"), MINIMAL).unwrap();

        let found = discover_blueprints(dir.path(), 4).unwrap();
        assert_eq!(found, vec!["blueprint.yaml"]);
    }

    #[test]
    fn discover_finds_nested_and_wrapped_blueprints() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("systems");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("a.yml"), MINIMAL).unwrap();
        fs::write(
            sub.join("b.yaml"),
            "system:\n  name: b\n  components: []\n",
        )
        .unwrap();

        let found = discover_blueprints(dir.path(), 4).unwrap();
        assert_eq!(found, vec!["systems/a.yml", "systems/b.yaml"]);
    }

    #[test]
    fn discover_ignores_other_yaml_and_skipped_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("compose.yaml"), "services:\n  db: {}\n").unwrap();
        let hidden = dir.path().join("generated").join("old");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("sys.yaml"), MINIMAL).unwrap();

        let found = discover_blueprints(dir.path(), 4).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn normalize_rejects_missing_and_blank() {
        let dir = tempfile::tempdir().unwrap();
        assert!(normalize_blueprint_path(dir.path(), "nope.yaml").is_err());
        assert!(normalize_blueprint_path(dir.path(), "  ").is_err());
    }

    #[test]
    fn normalize_resolves_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sys.yaml"), MINIMAL).unwrap();

        let path = normalize_blueprint_path(dir.path(), "sys.yaml").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("sys.yaml"));
    }
}
