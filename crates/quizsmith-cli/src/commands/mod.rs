pub mod generate;
pub mod grade;
pub mod init;
pub mod leaderboard;
pub mod list_models;
pub mod stats;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quizsmith_core::store::JsonFileStore;
use quizsmith_core::Quiz;
use quizsmith_providers::QuizsmithConfig;

/// A generated quiz together with the material it was built from.
///
/// The material travels with the quiz so a later `grade --analyze` can
/// review the attempt against it.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuizDocument {
    pub quiz: Quiz,
    pub content: String,
}

impl QuizDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read quiz from {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("failed to parse quiz JSON in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write quiz to {}", path.display()))?;
        tracing::debug!(path = %path.display(), quiz = %self.quiz.id, "quiz written");
        Ok(())
    }
}

/// Report output formats shared by `stats` and `leaderboard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Html,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "html" => Ok(Format::Html),
            other => anyhow::bail!("unknown format '{other}' (expected text, json or html)"),
        }
    }
}

pub fn open_store(config: &QuizsmithConfig, store_dir: Option<PathBuf>) -> JsonFileStore {
    JsonFileStore::new(store_dir.unwrap_or_else(|| config.store_dir.clone()))
}

pub fn fmt_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}%")).unwrap_or_else(|| "-".to_string())
}
