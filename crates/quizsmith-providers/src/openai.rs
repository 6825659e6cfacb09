//! OpenAI-compatible chat completions provider.
//!
//! Also serves Groq, which exposes the same API under `/openai`.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use quizsmith_core::traits::{GenerateRequest, GenerateResponse, LlmProvider, ModelInfo, TokenUsage};

use crate::error::ProviderError;
use crate::http;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai";

/// OpenAI-compatible API provider.
pub struct OpenAiProvider {
    name: &'static str,
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, base_url: Option<String>, org_id: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            name: "openai",
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            timeout_secs: http::DEFAULT_TIMEOUT_SECS,
            client: http::build_client(http::DEFAULT_TIMEOUT_SECS)?,
        })
    }

    /// Groq Cloud, through its OpenAI-compatible endpoint.
    pub fn groq(api_key: &str, base_url: Option<String>) -> anyhow::Result<Self> {
        let mut provider = Self::new(
            api_key,
            Some(base_url.unwrap_or_else(|| GROQ_BASE_URL.to_string())),
            None,
        )?;
        provider.name = "groq";
        Ok(provider)
    }

    /// Replace the client-level request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> anyhow::Result<Self> {
        self.client = http::build_client(timeout_secs)?;
        self.timeout_secs = timeout_secs;
        Ok(self)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    #[instrument(skip(self, request), fields(provider = self.name, model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let start = Instant::now();

        let body = ChatRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: request
                .messages
                .iter()
                .map(|m| ChatRequestMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .json(&body)
            .send()
            .await
            .map_err(|e| http::send_error(e, self.timeout_secs))?;
        let response = http::check_status(response, &request.model, http::nested_error_message).await?;
        let api_response: ChatResponse = http::decode(response).await?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::ApiError {
                status: 0,
                message: "response contained no message content".into(),
            })?;

        Ok(GenerateResponse {
            content,
            model: api_response.model,
            token_usage: TokenUsage {
                prompt_tokens: api_response.usage.prompt_tokens,
                completion_tokens: api_response.usage.completion_tokens,
                total_tokens: api_response.usage.total_tokens,
            },
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        let models: &[(&str, &str, u32)] = if self.name == "groq" {
            &[
                ("llama-3.3-70b-versatile", "Llama 3.3 70B Versatile", 131_072),
                ("llama-3.1-8b-instant", "Llama 3.1 8B Instant", 131_072),
            ]
        } else {
            &[
                ("gpt-4.1", "GPT-4.1", 1_000_000),
                ("gpt-4.1-mini", "GPT-4.1 Mini", 1_000_000),
                ("gpt-4o-mini", "GPT-4o Mini", 128_000),
            ]
        };
        models
            .iter()
            .map(|(id, name, max_context)| ModelInfo {
                id: (*id).into(),
                name: (*name).into(),
                provider: self.name.into(),
                max_context: *max_context,
            })
            .collect()
    }
}
