use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::process::Command;

use crate::blueprint::Blueprint;
use crate::config::RuntimeConfig;

use super::checker::DependencyCheck;
use super::types::{DependencyCategory, DependencyStatus};

const FIND_SPEC: &str =
    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

/// Interpreter version floor and importable packages for the generated system.
pub struct RuntimeCheck {
    config: RuntimeConfig,
}

impl RuntimeCheck {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        self.config.timeout.duration()
    }

    async fn check_interpreter(&self) -> DependencyStatus {
        let name = format!("runtime:{}", self.config.interpreter);
        let output = match run(&self.config.interpreter, &["--version"], self.timeout()).await {
            Ok(output) => output,
            Err(reason) => {
                return DependencyStatus::missing(name, DependencyCategory::Runtime, reason);
            }
        };
        let Some(found) = parse_version(&output) else {
            return DependencyStatus::missing(
                name,
                DependencyCategory::Runtime,
                format!("could not read a version from {:?}", output.trim()),
            );
        };
        let Some(floor) = parse_version(&self.config.min_version) else {
            return DependencyStatus::missing(
                name,
                DependencyCategory::Runtime,
                format!("invalid min_version {:?}", self.config.min_version),
            );
        };
        let version = join_version(&found);
        if found < floor {
            return DependencyStatus::missing(
                name,
                DependencyCategory::Runtime,
                format!("version {version} is below the required {}", self.config.min_version),
            )
            .with_version(version);
        }
        DependencyStatus::verified(name, DependencyCategory::Runtime).with_version(version)
    }

    async fn check_package(&self, package: &str) -> DependencyStatus {
        let name = format!("package:{package}");
        match run(&self.config.interpreter, &["-c", FIND_SPEC, package], self.timeout()).await {
            Ok(_) => DependencyStatus::verified(name, DependencyCategory::Runtime),
            Err(reason) => DependencyStatus::missing(
                name,
                DependencyCategory::Runtime,
                format!("not importable by {}: {reason}", self.config.interpreter),
            ),
        }
    }
}

#[async_trait]
impl DependencyCheck for RuntimeCheck {
    fn category(&self) -> DependencyCategory {
        DependencyCategory::Runtime
    }

    async fn check(&self, _blueprint: &Blueprint) -> Vec<DependencyStatus> {
        let interpreter = self.check_interpreter().await;
        if !interpreter.available {
            // Package checks would only repeat the interpreter failure.
            return vec![interpreter];
        }
        let packages = join_all(
            self.config
                .required_packages
                .iter()
                .map(|p| self.check_package(p)),
        )
        .await;
        std::iter::once(interpreter).chain(packages).collect()
    }
}

/// Run a program to completion under a timeout; `Ok` carries stdout+stderr.
async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<String, String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to start `{program}`: {e}"))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(format!("`{program}` failed: {e}")),
        Err(_) => return Err(format!("`{program}` timed out after {}s", timeout.as_secs())),
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if output.status.success() {
        Ok(text)
    } else {
        Err(format!("`{program}` exited with {}", output.status))
    }
}

/// First dotted numeric token, e.g. `Python 3.11.4` gives `[3, 11, 4]`.
fn parse_version(text: &str) -> Option<Vec<u32>> {
    text.split_whitespace()
        .map(|token| token.trim_start_matches('v'))
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|token| {
            token
                .split('.')
                .map(|part| {
                    let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                    digits.parse::<u32>().ok()
                })
                .collect()
        })
}

fn join_version(parts: &[u32]) -> String {
    parts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Component, ComponentType};
    use crate::config::Seconds;

    #[test]
    fn parses_interpreter_banners() {
        assert_eq!(parse_version("Python 3.11.4\n"), Some(vec![3, 11, 4]));
        assert_eq!(parse_version("3.9"), Some(vec![3, 9]));
        assert_eq!(parse_version("node v20.1.0"), Some(vec![20, 1, 0]));
        assert_eq!(parse_version("Python 3.13.0rc1"), Some(vec![3, 13, 0]));
        assert_eq!(parse_version("no digits here"), None);
    }

    #[test]
    fn version_comparison_is_numeric() {
        assert!(parse_version("3.10").unwrap() > parse_version("3.9").unwrap());
        assert!(parse_version("3.8.18").unwrap() < parse_version("3.9").unwrap());
        assert!(parse_version("3.9.0").unwrap() >= parse_version("3.9").unwrap());
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported_once() {
        let check = RuntimeCheck::new(RuntimeConfig {
            interpreter: "tiergate-no-such-interpreter".into(),
            min_version: "3.9".into(),
            required_packages: vec!["fastapi".into(), "pydantic".into()],
            timeout: Seconds(2),
        });
        let bp = Blueprint::new("bp", vec![Component::new("a", ComponentType::Source)]);
        let statuses = check.check(&bp).await;
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].available);
        assert!(
            statuses[0]
                .error_message
                .as_deref()
                .unwrap()
                .contains("failed to start")
        );
    }
}
