//! Provider error types.
//!
//! The error enum is defined in `quizsmith-core` so the engine can classify
//! failures; it is re-exported here for backend implementations.

pub use quizsmith_core::error::ProviderError;
