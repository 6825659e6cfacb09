//! Attempt grading.
//!
//! Grading is a pure function of the answer key and the submitted answers.
//! Persistence happens afterwards and is not part of scoring.

use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::model::{AnswerKey, OptionLabel, Quiz};

/// How a single question was graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuestionOutcome {
    Correct,
    Incorrect { expected: OptionLabel },
    /// Gradable, but the student left it blank.
    Unanswered { expected: OptionLabel },
    /// The question is invalid or its answer is unknown.
    Ungradable,
}

/// Result of grading one set of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// Number of correct answers.
    pub correct: u32,
    /// Number of questions counted towards the percentage.
    pub total: u32,
    /// `round(correct / total * 100)`, halves to even.
    pub percentage: f64,
    /// Outcome per question, in ordinal order.
    pub outcomes: Vec<QuestionOutcome>,
}

impl Grade {
    /// Human-readable per-question lines ("Q2: Incorrect (Correct: B)").
    pub fn summary_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| {
                let n = i + 1;
                match outcome {
                    QuestionOutcome::Correct => format!("Q{n}: Correct"),
                    QuestionOutcome::Incorrect { expected } => format!(
                        "Q{n}: Incorrect (Correct: {})",
                        expected.as_char().to_ascii_uppercase()
                    ),
                    QuestionOutcome::Unanswered { expected } => format!(
                        "Q{n}: Unanswered (Correct: {})",
                        expected.as_char().to_ascii_uppercase()
                    ),
                    QuestionOutcome::Ungradable => format!("Q{n}: Not graded"),
                }
            })
            .collect()
    }
}

/// Grade answers against a key where every slot counts towards the total.
///
/// A slot whose key is unknown can never be correct but still counts.
pub fn score(key: &AnswerKey, answers: &[Option<OptionLabel>]) -> Result<Grade, QuizError> {
    let counted = vec![true; key.len()];
    score_counted(key, answers, &counted)
}

/// Grade answers against a quiz, excluding invalid questions from the total.
pub fn grade_quiz(quiz: &Quiz, answers: &[Option<OptionLabel>]) -> Result<Grade, QuizError> {
    let counted: Vec<bool> = quiz.questions().iter().map(|q| q.is_valid()).collect();
    score_counted(quiz.answer_key(), answers, &counted)
}

fn score_counted(
    key: &AnswerKey,
    answers: &[Option<OptionLabel>],
    counted: &[bool],
) -> Result<Grade, QuizError> {
    if answers.len() != key.len() {
        return Err(QuizError::AnswerCountMismatch {
            expected: key.len(),
            actual: answers.len(),
        });
    }

    let total = counted.iter().filter(|c| **c).count() as u32;
    if total == 0 {
        return Err(QuizError::EmptyQuiz);
    }

    let outcomes: Vec<QuestionOutcome> = key
        .iter()
        .zip(answers)
        .zip(counted)
        .map(|((expected, given), counted)| match (counted, expected, given) {
            (false, _, _) | (true, None, _) => QuestionOutcome::Ungradable,
            (true, Some(expected), None) => QuestionOutcome::Unanswered { expected },
            (true, Some(expected), Some(given)) if *given == expected => QuestionOutcome::Correct,
            (true, Some(expected), Some(_)) => QuestionOutcome::Incorrect { expected },
        })
        .collect();

    let correct = outcomes
        .iter()
        .filter(|o| matches!(o, QuestionOutcome::Correct))
        .count() as u32;

    Ok(Grade {
        correct,
        total,
        percentage: percentage(correct, total),
        outcomes,
    })
}

fn percentage(correct: u32, total: u32) -> f64 {
    (correct as f64 / total as f64 * 100.0).round_ties_even()
}
