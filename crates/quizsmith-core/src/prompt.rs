//! Prompt construction for quiz generation and performance analysis.
//!
//! The quiz prompt fixes the textual layout that [`crate::parser`] reads
//! back. Changing the numbering, the option lettering or the answer key
//! marker here requires the matching change in the parser.

use crate::error::QuizError;
use crate::model::{Attempt, Difficulty};
use crate::parser::ANSWER_KEY_MARKER;
use crate::traits::ChatMessage;

/// Minimum number of characters of source content.
pub const MIN_CONTENT_CHARS: usize = 100;
/// Source content beyond this many characters is dropped before prompting.
pub const MAX_CONTENT_CHARS: usize = 25_000;
/// Content budget for the analysis prompt.
pub const MAX_ANALYSIS_CONTENT_CHARS: usize = 20_000;
/// Upper bound on questions per quiz.
pub const MAX_QUESTIONS: usize = 20;

const QUIZ_SYSTEM_PROMPT: &str = "You are an expert quiz creator. You write clear multiple-choice questions and follow the requested output format exactly.";

const ANALYSIS_SYSTEM_PROMPT: &str = "You are a supportive tutor who reviews quiz results and gives concrete study advice.";

/// Builds the instruction messages sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    difficulty: Difficulty,
    num_questions: usize,
    min_content_chars: usize,
    max_content_chars: usize,
    max_questions: usize,
}

impl PromptBuilder {
    pub fn new(difficulty: Difficulty, num_questions: usize) -> Self {
        Self {
            difficulty,
            num_questions,
            min_content_chars: MIN_CONTENT_CHARS,
            max_content_chars: MAX_CONTENT_CHARS,
            max_questions: MAX_QUESTIONS,
        }
    }

    pub fn with_max_questions(mut self, max_questions: usize) -> Self {
        self.max_questions = max_questions;
        self
    }

    pub fn with_content_limits(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_content_chars = min_chars;
        self.max_content_chars = max_chars;
        self
    }

    pub fn num_questions(&self) -> usize {
        self.num_questions
    }

    /// Cheap checks that run before any model call.
    pub fn validate(&self, content: &str) -> Result<(), QuizError> {
        if self.num_questions == 0 || self.num_questions > self.max_questions {
            return Err(QuizError::InvalidQuestionCount {
                requested: self.num_questions,
                max: self.max_questions,
            });
        }
        let length = content.trim().chars().count();
        if length < self.min_content_chars {
            return Err(QuizError::InsufficientContent {
                length,
                minimum: self.min_content_chars,
            });
        }
        Ok(())
    }

    /// Build the system and user messages for a quiz over `content`.
    pub fn build(&self, content: &str) -> Result<Vec<ChatMessage>, QuizError> {
        self.validate(content)?;

        let content = content.trim();
        let embedded = truncate_chars(content, self.max_content_chars);
        if embedded.len() < content.len() {
            tracing::warn!(
                max_chars = self.max_content_chars,
                "source content truncated before prompting"
            );
        }

        Ok(vec![
            ChatMessage::system(QUIZ_SYSTEM_PROMPT),
            ChatMessage::user(self.render(embedded)),
        ])
    }

    fn render(&self, content: &str) -> String {
        let n = self.num_questions;
        format!(
            "You're an expert quiz creator specializing in {difficulty} level questions.\n\
             Generate {n} high-quality multiple-choice questions based EXCLUSIVELY on the following content:\n\
             \n\
             {content}\n\
             \n\
             Requirements:\n\
             - Each question must cover a different key concept\n\
             - Questions should progress from basic to advanced\n\
             - Format each question exactly as:\n\
             Q1. <question text>\n\
             a) <option>\n\
             b) <option>\n\
             c) <option>\n\
             d) <option>\n\
             - After the last question, provide the answer key exactly as:\n\
             {marker}\n\
             1. <correct letter>\n\
             2. <correct letter>\n\
             ...\n\
             {n}. <correct letter>\n\
             - Avoid markdown formatting\n\
             - Ensure answers are factually correct based on the provided content",
            difficulty = self.difficulty,
            marker = ANSWER_KEY_MARKER,
        )
    }
}

/// Build the messages asking the model to review a graded attempt.
pub fn analysis_messages(content: &str, attempt: &Attempt) -> Vec<ChatMessage> {
    let content = truncate_chars(content.trim(), MAX_ANALYSIS_CONTENT_CHARS);
    let total = attempt.graded_total();
    let score = attempt.score();
    let pct = attempt.percentage();

    let mut questions = String::new();
    for q in attempt.questions() {
        questions.push_str(&format!("Q{}. {}\n", q.number, q.text));
        for (label, text) in &q.options {
            questions.push_str(&format!("{label}) {text}\n"));
        }
    }

    let mut wrong = Vec::new();
    let mut wrong_numbers = Vec::new();
    for (i, ((given, expected), question)) in attempt
        .user_answers()
        .iter()
        .zip(attempt.answer_key().iter())
        .zip(attempt.questions())
        .enumerate()
    {
        // Ungradable questions are not the student's mistakes.
        if !question.is_valid() || expected.is_none() {
            continue;
        }
        if *given != expected {
            wrong_numbers.push((i + 1).to_string());
            wrong.push(format!(
                "Question {}: User answered '{}', correct answer is '{}'",
                i + 1,
                label_or_blank(*given),
                label_or_blank(expected)
            ));
        }
    }

    let correct_answers: Vec<String> = attempt
        .answer_key()
        .iter()
        .map(label_or_blank)
        .collect();
    let user_answers: Vec<String> = attempt.user_answers().iter().copied().map(label_or_blank).collect();

    let prompt = format!(
        "Analyze the quiz performance based on:\n\
         - Original content: {content}\n\
         - Questions:\n{questions}\
         - Correct answers: {correct}\n\
         - User answers: {user}\n\
         - Actual score: {score}/{total} ({pct}%)\n\
         - Wrong answers: {wrong}\n\
         \n\
         Provide detailed analysis covering:\n\
         1. Overall score and accuracy percentage (which is {score}/{total}, {pct}%)\n\
         2. List of incorrect answers with brief explanations for questions: {wrong_numbers}\n\
         3. Identification of 2-3 weak areas/topics needing improvement\n\
         4. Specific study recommendations for each weak area\n\
         5. Encouraging feedback highlighting strengths\n\
         \n\
         Format the analysis clearly with headings for each section.\n\
         Avoid markdown and keep language professional yet supportive.",
        correct = correct_answers.join(", "),
        user = user_answers.join(", "),
        wrong = wrong.join("; "),
        wrong_numbers = wrong_numbers.join(", "),
    );

    vec![
        ChatMessage::system(ANALYSIS_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

fn label_or_blank(label: Option<crate::model::OptionLabel>) -> String {
    label.map(|l| l.to_string()).unwrap_or_default()
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
