//! quizsmith-core — Assessment generation and scoring engine.
//!
//! This crate turns study material into a prompt for a generative model,
//! parses the model's free-form reply back into a typed quiz, grades
//! attempts, and aggregates stored attempts into performance analytics.

pub mod analytics;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod profile;
pub mod prompt;
pub mod scoring;
pub mod store;
pub mod traits;

pub use error::{ProviderError, QuizError};
pub use model::{AnswerKey, Attempt, Difficulty, OptionLabel, Question, Quiz};
