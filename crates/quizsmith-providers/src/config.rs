//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizsmith_core::analytics::LeaderboardWeights;
use quizsmith_core::engine::EngineConfig;
use quizsmith_core::traits::LlmProvider;

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;

/// Configuration for a single model backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Groq {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Groq {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Groq")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// Top-level quizsmith configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizsmithConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Default provider to use.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default model to use.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Sampling temperature for quiz generation.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Max tokens per model reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound on one model call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries on transient provider errors. Off unless set.
    #[serde(default)]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Largest quiz that may be requested.
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
    /// Directory holding stored attempts.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Student roster used by the leaderboard.
    #[serde(default)]
    pub roster: Option<PathBuf>,
    /// Leaderboard composite weights.
    #[serde(default)]
    pub leaderboard: LeaderboardWeights,
}

fn default_provider() -> String {
    "groq".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_timeout() -> u64 {
    120
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_max_questions() -> usize {
    quizsmith_core::prompt::MAX_QUESTIONS
}
fn default_store_dir() -> PathBuf {
    PathBuf::from("./quizsmith-data")
}

impl Default for QuizsmithConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay(),
            max_questions: default_max_questions(),
            store_dir: default_store_dir(),
            roster: None,
            leaderboard: LeaderboardWeights::default(),
        }
    }
}

impl QuizsmithConfig {
    /// Engine settings for `model`, or the default model.
    pub fn engine_config(&self, model: Option<&str>) -> EngineConfig {
        EngineConfig {
            model: model.unwrap_or(&self.default_model).to_string(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_questions: self.max_questions,
        }
    }

    /// Build the named provider, or the default one.
    pub fn provider(&self, name: Option<&str>) -> Result<Box<dyn LlmProvider>> {
        let name = name.unwrap_or(&self.default_provider);
        let config = self.providers.get(name).with_context(|| {
            let mut configured: Vec<&str> = self.providers.keys().map(String::as_str).collect();
            configured.sort();
            format!(
                "provider '{name}' is not configured (configured: {})",
                if configured.is_empty() {
                    "none".to_string()
                } else {
                    configured.join(", ")
                }
            )
        })?;
        create_provider(config, self.timeout_secs)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    let resolve_opt = |s: &Option<String>| s.as_ref().map(|v| resolve_env_vars(v));
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
        },
        ProviderConfig::Groq { api_key, base_url } => ProviderConfig::Groq {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(base_url),
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `quizsmith.toml` in the current directory
/// 2. `~/.config/quizsmith/config.toml`
///
/// Environment variable overrides: `QUIZSMITH_GROQ_KEY`, `QUIZSMITH_OPENAI_KEY`,
/// `QUIZSMITH_ANTHROPIC_KEY`.
pub fn load_config() -> Result<QuizsmithConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizsmithConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizsmith.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<QuizsmithConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizsmithConfig::default(),
    };

    apply_env_overrides(&mut config);

    // Resolve env vars in all provider configs
    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    Ok(config)
}

fn apply_env_overrides(config: &mut QuizsmithConfig) {
    if let Ok(key) = std::env::var("QUIZSMITH_GROQ_KEY") {
        let entry = config
            .providers
            .entry("groq".into())
            .or_insert(ProviderConfig::Groq {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Groq { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("QUIZSMITH_ANTHROPIC_KEY") {
        let entry = config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let ProviderConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("QUIZSMITH_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizsmith"))
}

/// Create a provider instance from its configuration.
pub fn create_provider(config: &ProviderConfig, timeout_secs: u64) -> Result<Box<dyn LlmProvider>> {
    let require_key = |key: &str, provider: &str| {
        anyhow::ensure!(
            !key.trim().is_empty(),
            "no API key configured for provider '{provider}'"
        );
        Ok(())
    };

    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            require_key(api_key, "openai")?;
            Ok(Box::new(
                OpenAiProvider::new(api_key, base_url.clone(), org_id.clone())?
                    .with_timeout(timeout_secs)?,
            ))
        }
        ProviderConfig::Groq { api_key, base_url } => {
            require_key(api_key, "groq")?;
            Ok(Box::new(
                OpenAiProvider::groq(api_key, base_url.clone())?.with_timeout(timeout_secs)?,
            ))
        }
        ProviderConfig::Anthropic { api_key, base_url } => {
            require_key(api_key, "anthropic")?;
            Ok(Box::new(
                AnthropicProvider::new(api_key, base_url.clone())?.with_timeout(timeout_secs)?,
            ))
        }
        ProviderConfig::Ollama { base_url } => {
            Ok(Box::new(OllamaProvider::new(base_url)?.with_timeout(timeout_secs)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_QUIZSMITH_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_QUIZSMITH_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_QUIZSMITH_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_QUIZSMITH_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = QuizsmithConfig::default();
        assert_eq!(config.default_provider, "groq");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.leaderboard, LeaderboardWeights::default());
        assert_eq!(config.store_dir, PathBuf::from("./quizsmith-data"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
timeout_secs = 30
store_dir = "/tmp/attempts"

[leaderboard]
notes = 4.0

[providers.anthropic]
type = "anthropic"
api_key = "sk-test"

[providers.groq]
type = "groq"
api_key = "gsk-test"

[providers.ollama]
type = "ollama"
"#;
        let config: QuizsmithConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.leaderboard.notes, 4.0);
        assert_eq!(config.leaderboard.completed_tasks, 3.0);
        assert!(matches!(
            config.providers.get("ollama"),
            Some(ProviderConfig::Ollama { base_url }) if base_url == "http://localhost:11434"
        ));

        let engine = config.engine_config(None);
        assert_eq!(engine.model, "claude-sonnet-4-20250514");
        assert_eq!(engine.timeout, Duration::from_secs(30));
        assert_eq!(config.engine_config(Some("other")).model, "other");
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ProviderConfig::Groq {
            api_key: "gsk-secret".into(),
            base_url: None,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quizsmith.toml");
        std::fs::write(
            &path,
            "default_provider = \"openai\"\n\n[providers.openai]\ntype = \"openai\"\napi_key = \"${_QUIZSMITH_LOAD_KEY}\"\n",
        )
        .unwrap();
        std::env::set_var("_QUIZSMITH_LOAD_KEY", "sk-from-env");

        let config = load_config_from(Some(&path)).unwrap();
        assert!(matches!(
            config.providers.get("openai"),
            Some(ProviderConfig::OpenAI { api_key, .. }) if api_key == "sk-from-env"
        ));
        std::env::remove_var("_QUIZSMITH_LOAD_KEY");

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn unknown_provider_is_reported() {
        let config = QuizsmithConfig::default();
        let err = config.provider(Some("nope")).err().unwrap();
        assert!(err.to_string().contains("'nope' is not configured"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let config = ProviderConfig::Anthropic {
            api_key: "  ".into(),
            base_url: None,
        };
        assert!(create_provider(&config, 10).is_err());
        let ollama = ProviderConfig::Ollama {
            base_url: default_ollama_url(),
        };
        assert_eq!(create_provider(&ollama, 10).unwrap().name(), "ollama");
    }
}
