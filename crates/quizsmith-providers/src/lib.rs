//! quizsmith-providers — generative model backends.
//!
//! Implements the `LlmProvider` trait for OpenAI-compatible APIs (including
//! Groq), Anthropic and Ollama, plus the configuration file that selects
//! between them.

pub mod anthropic;
pub mod config;
pub mod error;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use config::{create_provider, load_config, load_config_from, ProviderConfig, QuizsmithConfig};
pub use error::ProviderError;
