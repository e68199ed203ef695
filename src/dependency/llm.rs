use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::blueprint::Blueprint;
use crate::config::Environment;
use crate::llm::{LlmClient, LlmProviderConfig};

use super::checker::DependencyCheck;
use super::types::{DependencyCategory, DependencyStatus};

/// At least one provider credential must be set, and the first one found
/// must answer a live echo probe.
pub struct LlmCheck {
    providers: Vec<LlmProviderConfig>,
    env: Environment,
    timeout: Duration,
}

impl LlmCheck {
    pub fn new(providers: Vec<LlmProviderConfig>, env: Environment, timeout: Duration) -> Self {
        Self {
            providers,
            env,
            timeout,
        }
    }
}

#[async_trait]
impl DependencyCheck for LlmCheck {
    fn category(&self) -> DependencyCategory {
        DependencyCategory::Llm
    }

    async fn check(&self, _blueprint: &Blueprint) -> Vec<DependencyStatus> {
        let Some((config, key)) = self
            .providers
            .iter()
            .find_map(|p| self.env.get(p.env_var()).map(|key| (p, key)))
        else {
            let vars: Vec<&str> = self.providers.iter().map(|p| p.env_var()).collect();
            return vec![DependencyStatus::missing(
                "llm credentials",
                DependencyCategory::Llm,
                format!("no LLM credentials: set one of {}", vars.join(", ")),
            )];
        };

        let name = format!("llm:{} ({})", config.provider, config.env_var());
        let client = match LlmClient::new(config, key, self.timeout) {
            Ok(client) => client,
            Err(err) => {
                return vec![DependencyStatus::missing(
                    name,
                    DependencyCategory::Llm,
                    format!("could not build client: {err}"),
                )];
            }
        };

        debug!(provider = %config.provider, model = client.model(), "probing LLM provider");
        // Outer bound also covers connect stalls.
        let status = match tokio::time::timeout(self.timeout, client.echo_probe()).await {
            Ok(Ok(())) => DependencyStatus::verified(name, DependencyCategory::Llm)
                .with_version(client.model()),
            Ok(Err(err)) => DependencyStatus::missing(
                name,
                DependencyCategory::Llm,
                format!("credentials present but connectivity probe failed: {err}"),
            ),
            Err(_) => DependencyStatus::missing(
                name,
                DependencyCategory::Llm,
                format!(
                    "credentials present but connectivity probe timed out after {}s",
                    self.timeout.as_secs()
                ),
            ),
        };
        vec![status]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Component, ComponentType};
    use crate::llm::LlmProvider;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn blueprint() -> Blueprint {
        Blueprint::new("bp", vec![Component::new("a", ComponentType::Source)])
    }

    #[tokio::test]
    async fn no_credentials_names_every_variable() {
        let check = LlmCheck::new(
            LlmProviderConfig::defaults(),
            Environment::default(),
            Duration::from_secs(1),
        );
        let statuses = check.check(&blueprint()).await;
        assert_eq!(statuses.len(), 1);
        let msg = statuses[0].error_message.as_deref().unwrap();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("ANTHROPIC_API_KEY"));
        assert!(!statuses[0].available);
    }

    #[tokio::test]
    async fn live_probe_success_is_verified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "pong"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = LlmProviderConfig {
            base_url: Some(server.uri()),
            ..LlmProviderConfig::new(LlmProvider::OpenAi)
        };
        let check = LlmCheck::new(
            vec![provider],
            Environment::from_pairs([("OPENAI_API_KEY", "sk")]),
            Duration::from_secs(5),
        );
        let statuses = check.check(&blueprint()).await;
        assert!(statuses[0].available);
        assert!(statuses[0].connection_test_passed);
        assert_eq!(statuses[0].version.as_deref(), Some("gpt-4o-mini"));
    }

    #[tokio::test]
    async fn probe_failure_is_distinguished_from_missing_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = LlmProviderConfig {
            base_url: Some(server.uri()),
            ..LlmProviderConfig::new(LlmProvider::Anthropic)
        };
        let check = LlmCheck::new(
            vec![provider],
            Environment::from_pairs([("ANTHROPIC_API_KEY", "ak")]),
            Duration::from_secs(5),
        );
        let statuses = check.check(&blueprint()).await;
        let msg = statuses[0].error_message.as_deref().unwrap();
        assert!(msg.starts_with("credentials present but connectivity probe failed"));
        assert!(statuses[0].name.contains("ANTHROPIC_API_KEY"));
    }
}
