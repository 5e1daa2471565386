//! LLM provider implementations

pub mod anthropic;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::{Config, ProviderConfig};
use std::sync::Arc;

/// Client protocols this crate can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Anthropic,
}

impl ProviderKind {
    pub fn from_name(name: &str) -> ProviderResult<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "gpt" => Ok(ProviderKind::OpenAI),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            _ => Err(ProviderError::Config(format!("Unknown provider: {}", name))),
        }
    }
}

fn build_openai(pc: Option<&ProviderConfig>) -> ProviderResult<OpenAIClient> {
    let env = pc
        .and_then(|p| p.api_key_env.as_deref())
        .unwrap_or(openai::API_KEY_ENV);
    let mut client = OpenAIClient::from_env_var(env)?;
    if let Some(pc) = pc {
        client = client.with_model(&pc.default_model);
        if let Some(url) = &pc.base_url {
            client = client.with_base_url(url);
        }
    }
    Ok(client)
}

fn build_anthropic(pc: Option<&ProviderConfig>) -> ProviderResult<AnthropicClient> {
    let env = pc
        .and_then(|p| p.api_key_env.as_deref())
        .unwrap_or(anthropic::API_KEY_ENV);
    let mut client = AnthropicClient::from_env_var(env)?;
    if let Some(pc) = pc {
        client = client.with_model(&pc.default_model);
        if let Some(url) = &pc.base_url {
            client = client.with_base_url(url);
        }
    }
    Ok(client)
}

/// Create the provider registered under `id`, applying settings from config.
///
/// `id` is looked up in `[providers.<id>]`; the entry's `name` selects the
/// client protocol, so several entries may share one protocol with
/// different endpoints. An id with no entry is treated as a protocol name
/// with built-in defaults.
pub fn create_provider_with_config(
    id: &str,
    config: &Config,
) -> ProviderResult<Arc<dyn LLMProvider + Send + Sync>> {
    let pc = config.get_provider(id);

    if let Some(pc) = pc {
        if !pc.enabled {
            return Err(ProviderError::Config(format!("Provider {} is disabled", id)));
        }
    }

    let kind = ProviderKind::from_name(pc.map(|p| p.name.as_str()).unwrap_or(id))?;
    let provider: Arc<dyn LLMProvider + Send + Sync> = match kind {
        ProviderKind::OpenAI => Arc::new(build_openai(pc)?),
        ProviderKind::Anthropic => Arc::new(build_anthropic(pc)?),
    };

    tracing::debug!(
        "Created provider {} ({}) with model {}",
        id,
        provider.name(),
        provider.default_model()
    );
    Ok(provider)
}
