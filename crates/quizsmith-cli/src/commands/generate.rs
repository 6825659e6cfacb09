//! The `quizsmith generate` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use quizsmith_core::engine::{QuizEngine, QuizRequest};
use quizsmith_core::prompt::PromptBuilder;
use quizsmith_core::traits::{ContentSource, TextFile};
use quizsmith_core::Difficulty;
use quizsmith_providers::load_config_from;

use super::QuizDocument;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    content_path: PathBuf,
    num_questions: usize,
    difficulty: String,
    title: Option<String>,
    subject: String,
    output: PathBuf,
    provider_name: Option<String>,
    model: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let difficulty: Difficulty = difficulty.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let source = TextFile(content_path.clone());
    let content = source.load()?;

    let config = load_config_from(config_path.as_deref())?;
    PromptBuilder::new(difficulty, num_questions)
        .with_max_questions(config.max_questions)
        .validate(&content)?;

    let provider = config.provider(provider_name.as_deref())?;
    let engine = QuizEngine::new(
        Arc::from(provider),
        config.engine_config(model.as_deref()),
    );

    let title = title.unwrap_or_else(|| {
        content_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled quiz".to_string())
    });

    eprintln!(
        "Generating {num_questions} {difficulty} questions with {} ...",
        engine.config().model
    );

    let request = QuizRequest {
        title,
        subject,
        difficulty,
        num_questions,
        content,
        source: source.reference(),
    };
    let quiz = engine
        .generate_quiz(&request)
        .await
        .context("quiz generation failed")?;

    let unusable = quiz.unusable_questions();
    if !unusable.is_empty() {
        eprintln!(
            "Warning: questions {:?} came back incomplete and will not be graded",
            unusable
        );
    }

    for question in quiz.questions() {
        println!("{}. {}", question.number, question.text);
        for (label, text) in &question.options {
            println!("   {label}) {text}");
        }
    }

    let document = QuizDocument {
        quiz,
        content: request.content,
    };
    document.save(&output)?;
    println!("\nQuiz saved to {}", output.display());

    Ok(())
}
