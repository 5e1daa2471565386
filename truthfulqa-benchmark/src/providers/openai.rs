//! OpenAI chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::traits::{
    api_key_from_env, CompletionRequest, CompletionResponse, LLMProvider, Message,
    ProviderError, ProviderResult,
};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI API client
///
/// Any server speaking the `/chat/completions` protocol can be targeted
/// with [`OpenAIClient::with_base_url`].
pub struct OpenAIClient {
    api_key: String,
    base_url: String,
    http_client: Client,
    default_model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from a named environment variable
    pub fn from_env_var(var: &str) -> ProviderResult<Self> {
        Ok(Self::new(api_key_from_env(var)?))
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    /// Legacy chat models
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    /// Reasoning models (o1, o3) and gpt-5.x
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<&Message> for OpenAIMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.clone(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn is_reasoning_model(model: &str) -> bool {
    model.starts_with("o1") || model.starts_with("o3")
}

fn build_request(request: &CompletionRequest, default_model: &str) -> OpenAIRequest {
    let mut messages: Vec<OpenAIMessage> = Vec::new();

    if let Some(system) = &request.system_prompt {
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
        });
    }
    messages.extend(request.messages.iter().map(OpenAIMessage::from));

    let model = request
        .model
        .clone()
        .unwrap_or_else(|| default_model.to_string());

    let reasoning = is_reasoning_model(&model);
    if reasoning || model.starts_with("gpt-5") {
        OpenAIRequest {
            max_tokens: None,
            max_completion_tokens: Some(request.max_tokens),
            temperature: if reasoning { None } else { request.temperature },
            model,
            messages,
        }
    } else {
        OpenAIRequest {
            max_tokens: Some(request.max_tokens),
            max_completion_tokens: None,
            temperature: request.temperature,
            model,
            messages,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();
        let body = build_request(request, &self.default_model);

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60)
                * 1000;

            // 429 also signals an exhausted quota, which waiting won't fix
            let body = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<OpenAIError>(&body) {
                let error_type = error.error.error_type.as_deref().unwrap_or("");
                if error_type == "insufficient_quota" {
                    return Err(ProviderError::Config(format!(
                        "OpenAI quota exceeded: {}",
                        error.error.message
                    )));
                }
                tracing::debug!("Rate limited (type={}): {}", error_type, error.error.message);
            }

            return Err(ProviderError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<OpenAIError>(&body) {
                Ok(error) => error.error.message,
                Err(_) => format!("HTTP {}: {}", status.as_u16(), body),
            };

            if status == 401 || status == 403 {
                return Err(ProviderError::Config(format!(
                    "OpenAI auth error ({}): {}",
                    status.as_u16(),
                    message
                )));
            }

            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: OpenAIResponse = response.json().await?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

        let (input_tokens, output_tokens) = api_response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            input_tokens,
            output_tokens,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "unknown".to_string()),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_leads_messages() {
        let request = CompletionRequest::new(vec![Message::user("Question: ?")], 64)
            .with_system("Answer with one choice.")
            .with_temperature(0.0);

        let body = build_request(&request, DEFAULT_MODEL);
        assert_eq!(body.model, "gpt-3.5-turbo");
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].role, "user");
        assert_eq!(body.max_tokens, Some(64));
        assert_eq!(body.max_completion_tokens, None);
        assert_eq!(body.temperature, Some(0.0));
    }

    #[test]
    fn test_reasoning_model_drops_temperature() {
        let request = CompletionRequest::new(vec![Message::user("Hi")], 32)
            .with_model("o3-mini")
            .with_temperature(0.0);

        let body = build_request(&request, DEFAULT_MODEL);
        assert_eq!(body.max_tokens, None);
        assert_eq!(body.max_completion_tokens, Some(32));
        assert_eq!(body.temperature, None);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAIClient::new("key".to_string()).with_base_url("http://localhost:8000/v1/");
        assert_eq!(client.base_url, "http://localhost:8000/v1");
    }
}
