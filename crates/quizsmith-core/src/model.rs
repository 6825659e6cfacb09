//! Core data model types for quizsmith.
//!
//! A `Quiz` is the transient product of one generation request. An `Attempt`
//! is the durable, immutable record created when a student submits answers
//! against a quiz; it carries a frozen copy of the questions and key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QuizError;
use crate::scoring::{self, Grade};

/// One of the four option labels of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    /// All labels in display order.
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    /// Map a letter to a label, ignoring case.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'a' => Some(OptionLabel::A),
            'b' => Some(OptionLabel::B),
            'c' => Some(OptionLabel::C),
            'd' => Some(OptionLabel::D),
            _ => None,
        }
    }

    /// The lowercase letter for this label.
    pub fn as_char(self) -> char {
        match self {
            OptionLabel::A => 'a',
            OptionLabel::B => 'b',
            OptionLabel::C => 'c',
            OptionLabel::D => 'd',
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                OptionLabel::from_char(c).ok_or_else(|| format!("invalid option label: {trimmed}"))
            }
            _ => Err(format!("invalid option label: {trimmed}")),
        }
    }
}

/// Requested difficulty of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "Easy"),
            Difficulty::Medium => write!(f, "Medium"),
            Difficulty::Hard => write!(f, "Hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based ordinal, unique within a quiz.
    pub number: u32,
    /// The question prompt, without its options.
    pub text: String,
    /// Option text keyed by label. Fewer than four entries marks the question invalid.
    #[serde(default)]
    pub options: BTreeMap<OptionLabel, String>,
}

impl Question {
    /// Placeholder for an ordinal the model never produced.
    pub fn missing(number: u32) -> Self {
        Self {
            number,
            text: String::new(),
            options: BTreeMap::new(),
        }
    }

    /// A question is usable only when all four labels carry option text.
    pub fn is_valid(&self) -> bool {
        OptionLabel::ALL
            .iter()
            .all(|label| self.options.get(label).is_some_and(|t| !t.is_empty()))
    }

    pub fn option(&self, label: OptionLabel) -> Option<&str> {
        self.options.get(&label).map(String::as_str)
    }
}

/// Correct labels aligned to question ordinals `1..=N`.
///
/// `None` is the "unknown" sentinel for an ordinal whose answer line the
/// model omitted. The length always equals the requested question count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(Vec<Option<OptionLabel>>);

impl AnswerKey {
    pub fn new(entries: Vec<Option<OptionLabel>>) -> Self {
        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entry for a 1-based question ordinal.
    pub fn for_question(&self, number: u32) -> Option<OptionLabel> {
        let index = (number as usize).checked_sub(1)?;
        self.0.get(index).copied().flatten()
    }

    /// Number of ordinals with no known answer.
    pub fn unknown_count(&self) -> usize {
        self.0.iter().filter(|e| e.is_none()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.unknown_count() == 0
    }

    pub fn entries(&self) -> &[Option<OptionLabel>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<OptionLabel>> + '_ {
        self.0.iter().copied()
    }
}

/// A generated quiz, held by the caller until an attempt is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    /// Unique quiz identifier.
    pub id: Uuid,
    /// Human-readable title.
    pub title: String,
    /// Subject used to group attempts in analytics.
    pub subject: String,
    /// Difficulty requested from the model.
    pub difficulty: Difficulty,
    /// Where the source content came from (file path, URL, "inline").
    pub source: String,
    /// When the quiz was generated.
    pub created_at: DateTime<Utc>,
    questions: Vec<Question>,
    answer_key: AnswerKey,
}

impl Quiz {
    /// Assemble a quiz, enforcing one key entry per question.
    pub fn new(
        title: impl Into<String>,
        subject: impl Into<String>,
        difficulty: Difficulty,
        source: impl Into<String>,
        questions: Vec<Question>,
        answer_key: AnswerKey,
    ) -> Result<Self, QuizError> {
        if questions.len() != answer_key.len() {
            return Err(QuizError::AnswerCountMismatch {
                expected: questions.len(),
                actual: answer_key.len(),
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            title: title.into(),
            subject: subject.into(),
            difficulty,
            source: source.into(),
            created_at: Utc::now(),
            questions,
            answer_key,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions that have four options and a known correct answer.
    pub fn usable_question_count(&self) -> usize {
        self.questions
            .iter()
            .zip(self.answer_key.iter())
            .filter(|(q, key)| q.is_valid() && key.is_some())
            .count()
    }

    /// Ordinals of questions that cannot be graded.
    pub fn unusable_questions(&self) -> Vec<u32> {
        self.questions
            .iter()
            .zip(self.answer_key.iter())
            .filter(|(q, key)| !q.is_valid() || key.is_none())
            .map(|(q, _)| q.number)
            .collect()
    }
}

/// An immutable, graded attempt at a quiz.
///
/// Fields are private: the only way to build one is [`Attempt::grade`],
/// which scores the answers exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    id: Uuid,
    student_id: String,
    quiz_id: Uuid,
    title: String,
    subject: String,
    difficulty: Difficulty,
    question_count: usize,
    questions: Vec<Question>,
    answer_key: AnswerKey,
    user_answers: Vec<Option<OptionLabel>>,
    score: u32,
    /// Questions counted towards `percentage`; invalid ones are left out.
    graded_total: u32,
    percentage: f64,
    #[serde(default)]
    analysis: Option<String>,
    created_at: DateTime<Utc>,
}

impl Attempt {
    /// Grade `answers` against `quiz` and freeze the result.
    pub fn grade(
        quiz: &Quiz,
        student_id: impl Into<String>,
        answers: Vec<Option<OptionLabel>>,
        created_at: DateTime<Utc>,
    ) -> Result<(Self, Grade), QuizError> {
        let grade = scoring::grade_quiz(quiz, &answers)?;
        let attempt = Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            quiz_id: quiz.id,
            title: quiz.title.clone(),
            subject: quiz.subject.clone(),
            difficulty: quiz.difficulty,
            question_count: quiz.len(),
            questions: quiz.questions().to_vec(),
            answer_key: quiz.answer_key().clone(),
            user_answers: answers,
            score: grade.correct,
            graded_total: grade.total,
            percentage: grade.percentage,
            analysis: None,
            created_at,
        };
        Ok((attempt, grade))
    }

    /// Attach the free-text analysis before the attempt is persisted.
    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        self.analysis = Some(analysis.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn quiz_id(&self) -> Uuid {
        self.quiz_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answer_key(&self) -> &AnswerKey {
        &self.answer_key
    }

    pub fn user_answers(&self) -> &[Option<OptionLabel>] {
        &self.user_answers
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Denominator of the score, as graded.
    pub fn graded_total(&self) -> u32 {
        self.graded_total
    }

    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    pub fn analysis(&self) -> Option<&str> {
        self.analysis.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
