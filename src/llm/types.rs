use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
        }
    }

    pub fn default_env_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com/v1",
            LlmProvider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-3-5-haiku-latest",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured provider: where its credential lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub provider: LlmProvider,
    #[serde(default)]
    pub env_var: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl LlmProviderConfig {
    pub fn new(provider: LlmProvider) -> Self {
        Self {
            provider,
            env_var: None,
            base_url: None,
            model: None,
        }
    }

    pub fn env_var(&self) -> &str {
        self.env_var
            .as_deref()
            .unwrap_or_else(|| self.provider.default_env_var())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// The two providers consulted when nothing is configured.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(LlmProvider::OpenAi),
            Self::new(LlmProvider::Anthropic),
        ]
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no LLM credentials: none of {} is set", join_vars(.env_vars))]
    MissingCredentials { env_vars: Vec<String> },

    #[error("{provider} request failed: {source}")]
    Http {
        provider: LlmProvider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} did not answer within {secs}s")]
    Timeout { provider: LlmProvider, secs: u64 },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: LlmProvider,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unexpected response: {detail}")]
    MalformedResponse { provider: LlmProvider, detail: String },
}

fn join_vars(vars: &[String]) -> String {
    vars.join(", ")
}
