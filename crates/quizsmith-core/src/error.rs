//! Error types for quiz generation and grading.
//!
//! `ProviderError` lives here rather than in `quizsmith-providers` so the
//! engine can downcast provider failures and decide whether a retry makes
//! sense without string matching.

use thiserror::Error;

/// Errors that can occur when interacting with a generative model backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ProviderError::AuthenticationFailed(_) | ProviderError::ModelNotFound(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Failures of the generation and grading pipeline.
///
/// Only segment-level problems are errors. A question with missing options
/// or a missing answer line is represented in the data model instead.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The source text is too short to produce meaningful questions.
    #[error("insufficient content: {length} characters provided, at least {minimum} required")]
    InsufficientContent { length: usize, minimum: usize },

    /// The requested question count is outside the supported range.
    #[error("invalid question count {requested}: must be between 1 and {max}")]
    InvalidQuestionCount { requested: usize, max: usize },

    /// The model call failed.
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// The model call did not finish in time.
    #[error("model call timed out after {0}s")]
    ModelTimeout(u64),

    /// The model output cannot be split into questions and answers.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    /// Grading was attempted on a quiz with nothing to grade.
    #[error("quiz has no gradable questions")]
    EmptyQuiz,

    /// The submitted answers do not line up with the quiz.
    #[error("expected {expected} answers, got {actual}")]
    AnswerCountMismatch { expected: usize, actual: usize },

    /// An answer was recorded for an ordinal the quiz does not have.
    #[error("question {number} does not exist (quiz has {count} questions)")]
    QuestionOutOfRange { number: u32, count: usize },

    /// An answer was not one of a, b, c or d.
    #[error("invalid answer '{0}': expected one of a, b, c, d")]
    InvalidAnswer(String),

    /// The graded attempt could not be persisted.
    #[error("failed to store attempt: {0}")]
    Storage(String),
}

impl QuizError {
    /// Whether regenerating the quiz may succeed where this attempt failed.
    pub fn is_regenerable(&self) -> bool {
        matches!(
            self,
            QuizError::ModelCall(_) | QuizError::ModelTimeout(_) | QuizError::MalformedResponse(_)
        )
    }
}
