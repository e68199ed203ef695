use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::Environment;

use super::types::{LlmError, LlmProvider, LlmProviderConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROBE_PROMPT: &str = "Reply with the single word: pong";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Minimal completion client for the supported providers.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    pub fn new(
        config: &LlmProviderConfig,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| LlmError::Http {
                provider: config.provider,
                source,
            })?;
        Ok(Self {
            http,
            provider: config.provider,
            base_url: config.base_url().to_string(),
            model: config.model().to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Build a client for the first provider whose credential variable is set.
    pub fn from_environment(
        providers: &[LlmProviderConfig],
        env: &Environment,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        for config in providers {
            if let Some(key) = env.get(config.env_var()) {
                return Self::new(config, key, timeout);
            }
        }
        Err(LlmError::MissingCredentials {
            env_vars: providers.iter().map(|p| p.env_var().to_string()).collect(),
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One minimal completion round-trip, used as a connectivity gate.
    pub async fn echo_probe(&self) -> Result<(), LlmError> {
        let reply = self.complete(None, PROBE_PROMPT, 8).await?;
        debug!(provider = %self.provider, reply = %reply.trim(), "LLM echo probe answered");
        Ok(())
    }

    /// Send a single-turn prompt and return the text of the reply.
    pub async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        match self.provider {
            LlmProvider::OpenAi => self.complete_openai(system, prompt, max_tokens).await,
            LlmProvider::Anthropic => self.complete_anthropic(system, prompt, max_tokens).await,
        }
    }

    async fn complete_openai(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
        });

        let request = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let parsed: OpenAiResponse = self.send(request).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| self.malformed("no choices in completion"))
    }

    async fn complete_anthropic(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [ChatMessage { role: "user", content: prompt }],
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let request = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let parsed: AnthropicResponse = self.send(request).await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(self.malformed("no text blocks in message"));
        }
        Ok(text)
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, LlmError> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: self.provider,
                status: status.as_u16(),
                body: truncate(&body, 300),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| self.malformed(&e.to_string()))
    }

    fn transport(&self, source: reqwest::Error) -> LlmError {
        if source.is_timeout() {
            LlmError::Timeout {
                provider: self.provider,
                secs: self.timeout.as_secs(),
            }
        } else {
            LlmError::Http {
                provider: self.provider,
                source,
            }
        }
    }

    fn malformed(&self, detail: &str) -> LlmError {
        LlmError::MalformedResponse {
            provider: self.provider,
            detail: detail.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
