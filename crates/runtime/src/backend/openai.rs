//! OpenAI-compatible chat completions backend (DeepSeek, OpenAI, ...).

use super::{ChatRequest, ChatResponse, LlmBackend, Usage};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// DeepSeek's OpenAI-compatible endpoint.
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
/// DeepSeek's general chat model.
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Builder for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiCompatibleBackendBuilder {
    /// Create a builder targeting DeepSeek by default.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEEPSEEK_BASE_URL.to_string(),
            max_tokens: 4096,
        }
    }

    /// Point the backend at another OpenAI-compatible server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the maximum tokens for responses.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build(self) -> OpenAiCompatibleBackend {
        OpenAiCompatibleBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            max_tokens: self.max_tokens,
        }
    }
}

/// Backend for any server speaking the OpenAI chat completions API.
pub struct OpenAiCompatibleBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiCompatibleBackend {
    pub fn builder(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> OpenAiCompatibleBackendBuilder {
        OpenAiCompatibleBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, request: &ChatRequest<'a>) -> ApiRequest<'a> {
        // The system prompt travels as the leading message.
        let system = request.system.map(|content| ApiMessage {
            role: "system",
            content,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            }))
            .collect();

        ApiRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        }
    }
}

impl std::fmt::Display for OpenAiCompatibleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "openai-compatible({}, {})", self.model, self.base_url)
    }
}

impl LlmBackend for OpenAiCompatibleBackend {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
        let body = self.build_request(&request);

        debug!(model = %self.model, messages = body.messages.len(), "sending chat completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Api("response contained no message content".into()))?;

        let usage = api_response
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse { content, usage })
    }
}
