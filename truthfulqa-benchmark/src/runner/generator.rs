//! Answer generation through a chat provider

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::BenchmarkConfig;
use crate::prompt::{ChatPrompt, PromptError, RenderedPrompt};
use crate::providers::{CompletionRequest, LLMProvider, Message, ProviderError, ProviderResult};

/// Produces the model's free-text answer for one question
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// `candidates_display` is the candidate list joined one per line
    async fn generate(&self, question: &str, candidates_display: &str) -> ProviderResult<String>;

    /// Provider name for reporting
    fn provider_name(&self) -> &str;

    /// Model name for reporting
    fn model(&self) -> &str;
}

/// [`AnswerGenerator`] that renders the chat prompt and issues one
/// completion per question
pub struct ChatAnswerGenerator {
    provider: Arc<dyn LLMProvider + Send + Sync>,
    prompt: ChatPrompt,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ChatAnswerGenerator {
    pub fn new(provider: Arc<dyn LLMProvider + Send + Sync>, prompt: ChatPrompt) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            prompt,
            model,
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    /// Apply model, temperature and token cap from the benchmark settings
    pub fn from_config(
        provider: Arc<dyn LLMProvider + Send + Sync>,
        prompt: ChatPrompt,
        config: &BenchmarkConfig,
    ) -> Self {
        let mut generator = Self::new(provider, prompt)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);
        if let Some(model) = &config.model {
            generator = generator.with_model(model);
        }
        generator
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Render the prompt turns without sending anything
    pub fn render(&self, question: &str, candidates_display: &str) -> Result<RenderedPrompt, PromptError> {
        self.prompt.render(question, candidates_display)
    }

    fn build_request(&self, rendered: RenderedPrompt) -> CompletionRequest {
        CompletionRequest::new(vec![Message::user(rendered.user)], self.max_tokens)
            .with_system(rendered.system)
            .with_model(&self.model)
            .with_temperature(self.temperature)
    }
}

#[async_trait]
impl AnswerGenerator for ChatAnswerGenerator {
    async fn generate(&self, question: &str, candidates_display: &str) -> ProviderResult<String> {
        let rendered = self
            .render(question, candidates_display)
            .map_err(|e| ProviderError::Config(e.to_string()))?;

        let response = self.provider.complete(&self.build_request(rendered)).await?;
        tracing::debug!(
            "{} answered in {}ms ({} in / {} out tokens, finish: {})",
            response.model,
            response.latency_ms,
            response.input_tokens,
            response.output_tokens,
            response.finish_reason
        );

        Ok(response.content)
    }

    fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
