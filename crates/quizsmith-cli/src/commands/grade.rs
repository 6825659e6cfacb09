//! The `quizsmith grade` command.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use quizsmith_core::engine::{QuizEngine, QuizSession, Submission};
use quizsmith_core::store::AttemptStore;
use quizsmith_providers::load_config_from;
use quizsmith_report::{render_attempt, write_html_report};

use super::{open_store, QuizDocument};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    quiz_path: PathBuf,
    student: String,
    answers: Option<String>,
    analyze: bool,
    html: Option<PathBuf>,
    store_dir: Option<PathBuf>,
    provider_name: Option<String>,
    model: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(!student.trim().is_empty(), "student id must not be empty");

    let config = load_config_from(config_path.as_deref())?;
    let document = QuizDocument::load(&quiz_path)?;
    let mut session = QuizSession::new(document.quiz, document.content);

    match answers {
        Some(list) => fill_from_list(&mut session, &list)?,
        None => {
            let stdin = std::io::stdin();
            fill_interactively(&mut session, &mut stdin.lock())?;
        }
    }

    let store = open_store(&config, store_dir);
    let Submission { attempt, grade } = if analyze {
        let provider = config.provider(provider_name.as_deref())?;
        let engine = QuizEngine::new(Arc::from(provider), config.engine_config(model.as_deref()));
        engine.submit(&session, &student, &store, true).await?
    } else {
        let (attempt, grade) = session.grade(&student)?;
        store
            .save(&attempt)
            .with_context(|| format!("failed to store attempt in {}", store.root().display()))?;
        Submission { attempt, grade }
    };

    println!(
        "Score: {}/{} ({:.0}%)",
        grade.correct, grade.total, grade.percentage
    );
    for line in grade.summary_lines() {
        println!("  {line}");
    }
    if let Some(analysis) = attempt.analysis() {
        println!("\nAnalysis:\n{analysis}");
    }

    if let Some(path) = html {
        write_html_report(&render_attempt(&attempt, &grade), &path)?;
        println!("\nReport written to {}", path.display());
    }

    Ok(())
}

/// Apply a comma-separated answer list; empty entries leave a question blank.
fn fill_from_list(session: &mut QuizSession, list: &str) -> Result<()> {
    let entries: Vec<&str> = list.split(',').map(str::trim).collect();
    anyhow::ensure!(
        entries.len() <= session.quiz().len(),
        "{} answers given for a quiz with {} questions",
        entries.len(),
        session.quiz().len()
    );

    for (number, entry) in (1u32..).zip(entries) {
        if !entry.is_empty() {
            session.answer_str(number, entry)?;
        }
    }
    Ok(())
}

/// Ask for each usable question on the terminal. A blank line skips it.
fn fill_interactively(session: &mut QuizSession, input: &mut impl BufRead) -> Result<()> {
    let questions = session.quiz().questions().to_vec();
    let mut stdout = std::io::stdout();

    for question in questions.iter().filter(|q| q.is_valid()) {
        println!("\n{}. {}", question.number, question.text);
        for (label, text) in &question.options {
            println!("   {label}) {text}");
        }

        loop {
            print!("Answer (a-d, blank to skip): ");
            stdout.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            match session.answer_str(question.number, line) {
                Ok(()) => break,
                Err(e) => println!("{e}"),
            }
        }
    }

    let unanswered = session.unanswered();
    if !unanswered.is_empty() {
        eprintln!("Unanswered: {unanswered:?}");
    }
    Ok(())
}
