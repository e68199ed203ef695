// LLM access shared by the preflight probe and the semantic tier.
mod client;
mod types;

pub use client::LlmClient;
pub use types::{LlmError, LlmProvider, LlmProviderConfig};
