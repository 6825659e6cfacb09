//! Trait definitions at the engine's external boundaries.
//!
//! `LlmProvider` is implemented by the `quizsmith-providers` crate.
//! `ContentSource` is the boundary to document ingestion.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generative model provider
// ---------------------------------------------------------------------------

/// Trait for generative text backends: role-tagged messages in, plain text out.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Generate a reply to the conversation in `request`.
    async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse>;

    /// List available models for this provider.
    fn available_models(&self) -> Vec<ModelInfo>;
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Request to generate text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier (e.g. "llama-3.3-70b-versatile").
    pub model: String,
    /// Ordered conversation; system messages first.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl GenerateRequest {
    /// Concatenated system messages, for backends with a separate system field.
    pub fn system_prompt(&self) -> Option<String> {
        let system: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if system.is_empty() {
            None
        } else {
            Some(system.join("\n\n"))
        }
    }

    /// Messages other than system messages, in order.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

/// Response from a generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// The raw text returned by the model. Untrusted.
    pub content: String,
    /// Model that actually generated the response.
    pub model: String,
    /// Token usage.
    pub token_usage: TokenUsage,
    /// Latency in milliseconds.
    pub latency_ms: u64,
}

/// Token accounting for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Information about an available model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier.
    pub id: String,
    /// Human-readable model name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Maximum context window size in tokens.
    pub max_context: u32,
}

// ---------------------------------------------------------------------------
// Content extraction boundary
// ---------------------------------------------------------------------------

/// Supplies raw study material, or fails with an extraction error.
pub trait ContentSource {
    /// Short reference stored with the quiz (path, URL, "inline").
    fn reference(&self) -> String;

    /// Load the raw text.
    fn load(&self) -> anyhow::Result<String>;
}

/// Text supplied directly by the caller.
#[derive(Debug, Clone)]
pub struct InlineText(pub String);

impl ContentSource for InlineText {
    fn reference(&self) -> String {
        "inline".to_string()
    }

    fn load(&self) -> anyhow::Result<String> {
        let text = self.0.trim();
        anyhow::ensure!(!text.is_empty(), "no text content provided");
        Ok(text.to_string())
    }
}

/// A UTF-8 text or markdown file on disk.
#[derive(Debug, Clone)]
pub struct TextFile(pub PathBuf);

impl ContentSource for TextFile {
    fn reference(&self) -> String {
        self.0.display().to_string()
    }

    fn load(&self) -> anyhow::Result<String> {
        let text = std::fs::read_to_string(&self.0)
            .with_context(|| format!("failed to read content file: {}", self.0.display()))?;
        anyhow::ensure!(
            !text.trim().is_empty(),
            "no readable text content found in {}",
            self.0.display()
        );
        Ok(text.trim().to_string())
    }
}
