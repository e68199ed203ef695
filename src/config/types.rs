use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::llm::LlmProviderConfig;

/// A timeout in whole seconds. Accepts `30`, `"30s"` or `"2m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seconds(pub u64);

impl Seconds {
    pub fn duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Serialize for Seconds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Seconds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SecondsVisitor;

        impl<'de> Visitor<'de> for SecondsVisitor {
            type Value = Seconds;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a positive number of seconds, or a string like \"30s\" or \"2m\"")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Seconds, E> {
                if value == 0 {
                    return Err(E::custom("timeout must be positive"));
                }
                Ok(Seconds(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Seconds, E> {
                if value <= 0 {
                    return Err(E::custom("timeout must be positive"));
                }
                Ok(Seconds(value as u64))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Seconds, E> {
                let value = value.trim();
                let (digits, scale) = if let Some(n) = value.strip_suffix('m') {
                    (n, 60)
                } else if let Some(n) = value.strip_suffix('s') {
                    (n, 1)
                } else {
                    (value, 1)
                };
                let n: u64 = digits
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("invalid timeout {value:?}")))?;
                let secs = n
                    .checked_mul(scale)
                    .ok_or_else(|| E::custom(format!("timeout {value:?} is too large")))?;
                self.visit_u64(secs)
            }
        }

        deserializer.deserialize_any(SecondsVisitor)
    }
}

/// Interpreter and packages the generated system needs at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub interpreter: String,
    pub min_version: String,
    pub required_packages: Vec<String>,
    pub timeout: Seconds,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".into(),
            min_version: "3.9".into(),
            required_packages: Vec::new(),
            timeout: Seconds(15),
        }
    }
}

/// What preflight checks and how long each probe may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    pub llm_providers: Vec<LlmProviderConfig>,
    pub database_env_vars: Vec<String>,
    pub runtime: RuntimeConfig,
    pub llm_probe_timeout: Seconds,
    pub database_timeout: Seconds,
    pub service_timeout: Seconds,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            llm_providers: LlmProviderConfig::defaults(),
            database_env_vars: vec!["DATABASE_URL".into(), "POSTGRES_URL".into()],
            runtime: RuntimeConfig::default(),
            llm_probe_timeout: Seconds(30),
            database_timeout: Seconds(10),
            service_timeout: Seconds(5),
        }
    }
}

/// Bounds on every collaborator invocation the orchestrator makes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub validator: Seconds,
    pub healer: Seconds,
    pub finalizer: Seconds,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            validator: Seconds(120),
            healer: Seconds(300),
            finalizer: Seconds(600),
        }
    }
}

/// External programs that heal and finalize. Each is an argv list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub ast_healer: Vec<String>,
    pub semantic_healer: Vec<String>,
    pub config_regenerator: Vec<String>,
    pub finalizer: Vec<String>,
    pub output_dir: String,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            ast_healer: Vec::new(),
            semantic_healer: Vec::new(),
            config_regenerator: Vec::new(),
            finalizer: Vec::new(),
            output_dir: "generated".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub blueprint: Option<String>,
    pub search_depth: usize,
    pub report_path: String,
    pub dependencies: DependencyConfig,
    pub timeouts: TimeoutConfig,
    pub collaborators: CollaboratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blueprint: None,
            search_depth: 4,
            report_path: "tiergate-report.json".into(),
            dependencies: DependencyConfig::default(),
            timeouts: TimeoutConfig::default(),
            collaborators: CollaboratorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;

    #[test]
    fn seconds_accepts_numbers_and_suffixes() {
        let parse = |s: &str| serde_yaml::from_str::<Seconds>(s);
        assert_eq!(parse("45").unwrap(), Seconds(45));
        assert_eq!(parse("\"30s\"").unwrap(), Seconds(30));
        assert_eq!(parse("\"2m\"").unwrap(), Seconds(120));
        assert!(parse("0").is_err());
        assert!(parse("-3").is_err());
        assert!(parse("\"soon\"").is_err());
    }

    #[test]
    fn seconds_rejects_overflowing_minutes() {
        let err = serde_yaml::from_str::<Seconds>("\"18446744073709551615m\"").unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let raw = "timeouts:\n  healer: 10s\ndependencies:\n  runtime:\n    required_packages: [fastapi]\n";
        let cfg: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.timeouts.healer, Seconds(10));
        assert_eq!(cfg.timeouts.validator, Seconds(120));
        assert_eq!(cfg.dependencies.runtime.interpreter, "python3");
        assert_eq!(cfg.dependencies.runtime.required_packages, vec!["fastapi"]);
        assert_eq!(cfg.dependencies.llm_providers.len(), 2);
    }

    #[test]
    fn provider_overrides_parse() {
        let raw = "dependencies:\n  llm_providers:\n    - provider: anthropic\n      env_var: MY_KEY\n";
        let cfg: Config = serde_yaml::from_str(raw).unwrap();
        let providers = &cfg.dependencies.llm_providers;
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].provider, LlmProvider::Anthropic);
        assert_eq!(providers[0].env_var(), "MY_KEY");
        assert_eq!(providers[0].base_url(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn defaults_accept_both_database_variables() {
        let cfg = Config::default();
        assert_eq!(
            cfg.dependencies.database_env_vars,
            vec!["DATABASE_URL", "POSTGRES_URL"]
        );
        assert!(cfg.collaborators.ast_healer.is_empty());
    }
}
