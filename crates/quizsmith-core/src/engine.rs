//! Quiz generation and attempt submission.
//!
//! The engine is stateless between calls. Everything that belongs to one
//! quiz in progress lives in a [`QuizSession`] owned by the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::instrument;

use crate::error::{ProviderError, QuizError};
use crate::model::{Attempt, Difficulty, OptionLabel, Quiz};
use crate::parser;
use crate::prompt::{self, PromptBuilder, MAX_QUESTIONS};
use crate::scoring::Grade;
use crate::store::AttemptStore;
use crate::traits::{ChatMessage, GenerateRequest, LlmProvider};

/// Configuration for the quiz engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier passed to the provider.
    pub model: String,
    /// Temperature for generation.
    pub temperature: f64,
    /// Max tokens for generation.
    pub max_tokens: u32,
    /// Upper bound on one model call.
    pub timeout: Duration,
    /// Retries on transient provider errors. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    /// Largest quiz that may be requested.
    pub max_questions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout: Duration::from_secs(120),
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
            max_questions: MAX_QUESTIONS,
        }
    }
}

/// What to generate a quiz from.
#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub title: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub num_questions: usize,
    /// Raw source text.
    pub content: String,
    /// Where `content` came from (file path, URL, "inline").
    pub source: String,
}

/// Turns source text into quizzes and graded attempts into stored records.
pub struct QuizEngine {
    provider: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl QuizEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Generate a quiz with exactly `request.num_questions` questions.
    ///
    /// Questions the model botched are kept but marked unusable; see
    /// [`Quiz::usable_question_count`].
    #[instrument(
        skip(self, request),
        fields(provider = self.provider.name(), model = %self.config.model, n = request.num_questions)
    )]
    pub async fn generate_quiz(&self, request: &QuizRequest) -> Result<Quiz, QuizError> {
        let builder = PromptBuilder::new(request.difficulty, request.num_questions)
            .with_max_questions(self.config.max_questions);
        let messages = builder.build(&request.content)?;

        let raw = self.call_model(messages).await?;
        let parsed = parser::parse_quiz(&raw, request.num_questions)?;

        let quiz = Quiz::new(
            request.title.clone(),
            request.subject.clone(),
            request.difficulty,
            request.source.clone(),
            parsed.questions,
            parsed.answer_key,
        )?;

        let usable = quiz.usable_question_count();
        if usable < quiz.len() {
            tracing::warn!(
                usable,
                requested = quiz.len(),
                unusable = ?quiz.unusable_questions(),
                "quiz generated with unusable questions"
            );
        } else {
            tracing::info!(quiz = %quiz.id, questions = quiz.len(), "quiz generated");
        }
        Ok(quiz)
    }

    /// Ask the model for a free-text review of a graded attempt.
    pub async fn analyze(&self, content: &str, attempt: &Attempt) -> Result<String, QuizError> {
        let messages = prompt::analysis_messages(content, attempt);
        let text = self.call_model(messages).await?;
        Ok(text.trim().to_string())
    }

    /// Grade a session, optionally attach an analysis, and persist the attempt.
    ///
    /// A failed analysis never loses the score: the attempt is stored
    /// without one. A failed save stores nothing.
    pub async fn submit(
        &self,
        session: &QuizSession,
        student_id: &str,
        store: &dyn AttemptStore,
        with_analysis: bool,
    ) -> Result<Submission, QuizError> {
        let (mut attempt, grade) = session.grade(student_id)?;

        if with_analysis {
            match self.analyze(session.content(), &attempt).await {
                Ok(text) => attempt = attempt.with_analysis(text),
                Err(e) => {
                    tracing::warn!(error = %e, "performance analysis failed, storing attempt without it")
                }
            }
        }

        store
            .save(&attempt)
            .map_err(|e| QuizError::Storage(format!("{e:#}")))?;
        Ok(Submission { attempt, grade })
    }

    async fn call_model(&self, messages: Vec<ChatMessage>) -> Result<String, QuizError> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let start = Instant::now();
        let mut retry_delay = self.config.retry_delay;
        let mut last_error = None;

        for retry in 0..=self.config.max_retries {
            if retry > 0 {
                tracing::debug!(retry, delay_ms = retry_delay.as_millis() as u64, "retrying model call");
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(Duration::from_secs(60));
            }

            let error = match tokio::time::timeout(self.config.timeout, self.provider.generate(&request)).await {
                Ok(Ok(response)) => {
                    tracing::debug!(
                        latency_ms = start.elapsed().as_millis() as u64,
                        completion_tokens = response.token_usage.completion_tokens,
                        "model call finished"
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    if let Some(provider_err) = e.downcast_ref::<ProviderError>() {
                        if provider_err.is_permanent() {
                            return Err(QuizError::ModelCall(format!("{e:#}")));
                        }
                        if let Some(ms) = provider_err.retry_after_ms() {
                            retry_delay = Duration::from_millis(ms);
                        }
                    }
                    QuizError::ModelCall(format!("{e:#}"))
                }
                Err(_) => QuizError::ModelTimeout(self.config.timeout.as_secs()),
            };

            tracing::warn!(error = %error, attempt = retry + 1, "model call failed");
            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| QuizError::ModelCall("no attempt was made".into())))
    }
}

/// A graded and stored attempt.
#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt: Attempt,
    pub grade: Grade,
}

/// One student's pass through a quiz: the quiz, its source text and the
/// answers recorded so far.
#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: Quiz,
    content: String,
    answers: Vec<Option<OptionLabel>>,
}

impl QuizSession {
    pub fn new(quiz: Quiz, content: impl Into<String>) -> Self {
        let answers = vec![None; quiz.len()];
        Self {
            quiz,
            content: content.into(),
            answers,
        }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn answers(&self) -> &[Option<OptionLabel>] {
        &self.answers
    }

    /// Record the answer for a 1-based question ordinal, replacing any earlier one.
    pub fn answer(&mut self, number: u32, label: OptionLabel) -> Result<(), QuizError> {
        let slot = self.slot(number)?;
        *slot = Some(label);
        Ok(())
    }

    /// Record an answer given as text ("a".."d", any case).
    pub fn answer_str(&mut self, number: u32, answer: &str) -> Result<(), QuizError> {
        let label = answer
            .parse::<OptionLabel>()
            .map_err(|_| QuizError::InvalidAnswer(answer.trim().to_string()))?;
        self.answer(number, label)
    }

    pub fn clear(&mut self, number: u32) -> Result<(), QuizError> {
        let slot = self.slot(number)?;
        *slot = None;
        Ok(())
    }

    /// Ordinals of usable questions that have no answer yet.
    pub fn unanswered(&self) -> Vec<u32> {
        self.quiz
            .questions()
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| q.is_valid() && a.is_none())
            .map(|(q, _)| q.number)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unanswered().is_empty()
    }

    /// Grade the recorded answers. Does not persist anything.
    pub fn grade(&self, student_id: &str) -> Result<(Attempt, Grade), QuizError> {
        Attempt::grade(&self.quiz, student_id, self.answers.clone(), Utc::now())
    }

    fn slot(&mut self, number: u32) -> Result<&mut Option<OptionLabel>, QuizError> {
        let count = self.answers.len();
        (number as usize)
            .checked_sub(1)
            .and_then(|i| self.answers.get_mut(i))
            .ok_or(QuizError::QuestionOutOfRange { number, count })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::model::tests::quiz_with_key;
    use crate::store::MemoryStore;
    use crate::traits::{GenerateResponse, ModelInfo, TokenUsage};
    use OptionLabel::*;

    const FIVE_QUESTIONS: &str = "Q1. First?\na) one\nb) two\nc) three\nd) four\n\
        Q2. Second?\na) one\nb) two\nc) three\nd) four\n\
        Q3. Third?\na) one\nb) two\nc) three\nd) four\n\
        Q4. Fourth?\na) one\nb) two\nc) three\nd) four\n\
        Q5. Fifth?\na) one\nb) two\nc) three\nd) four\n\
        Answer Key:\n1. a\n2. a\n3. c\n4. d\n5. b\n";

    /// Replays queued results; the last one repeats.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        delay: Option<Duration>,
        calls: AtomicU32,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                delay: None,
                calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }
        }

        fn ok(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string())])
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    match script.front().unwrap() {
                        Ok(text) => Ok(text.clone()),
                        Err(e) => Err(ProviderError::NetworkError(e.to_string())),
                    }
                }
            };
            let content = next?;
            Ok(GenerateResponse {
                content,
                model: request.model.clone(),
                token_usage: TokenUsage::default(),
                latency_ms: 1,
            })
        }

        fn available_models(&self) -> Vec<ModelInfo> {
            vec![]
        }
    }

    fn engine(provider: Arc<ScriptedProvider>, config: EngineConfig) -> QuizEngine {
        QuizEngine::new(provider, config)
    }

    fn request(content: String, n: usize) -> QuizRequest {
        QuizRequest {
            title: "Cells".into(),
            subject: "biology".into(),
            difficulty: Difficulty::Medium,
            num_questions: n,
            content,
            source: "inline".into(),
        }
    }

    fn content(len: usize) -> String {
        "The mitochondria is the powerhouse of the cell. ".chars().cycle().take(len).collect()
    }

    #[tokio::test]
    async fn generates_and_grades_end_to_end() {
        let provider = Arc::new(ScriptedProvider::ok(FIVE_QUESTIONS));
        let engine = engine(provider.clone(), EngineConfig::default());
        let text = content(500);

        let quiz = engine.generate_quiz(&request(text.clone(), 5)).await.unwrap();
        assert_eq!(quiz.len(), 5);
        assert!(quiz.answer_key().is_complete());
        assert_eq!(quiz.usable_question_count(), 5);

        let sent = provider.last_request.lock().unwrap().clone().unwrap();
        let user = &sent.messages[1].content;
        assert!(user.contains('5'));
        assert!(user.contains("Medium"));
        assert!(user.contains(text.trim()));

        let mut session = QuizSession::new(quiz, text);
        for (n, label) in [A, B, C, D, A].into_iter().enumerate() {
            session.answer(n as u32 + 1, label).unwrap();
        }
        let (attempt, grade) = session.grade("alice").unwrap();
        assert_eq!(attempt.score(), 3);
        assert_eq!(grade.percentage, 60.0);
    }

    #[tokio::test]
    async fn short_content_fails_before_calling_model() {
        let provider = Arc::new(ScriptedProvider::ok(FIVE_QUESTIONS));
        let engine = engine(provider.clone(), EngineConfig::default());
        let err = engine.generate_quiz(&request("tiny".into(), 5)).await.unwrap_err();
        assert!(matches!(err, QuizError::InsufficientContent { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn missing_marker_is_malformed() {
        let provider = Arc::new(ScriptedProvider::ok("Q1. What?\na) x\nb) y\nc) z\nd) w\n"));
        let engine = engine(provider, EngineConfig::default());
        let err = engine.generate_quiz(&request(content(200), 1)).await.unwrap_err();
        assert!(matches!(err, QuizError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn provider_failure_is_model_call_error_without_retry() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::NetworkError("connection reset".into())),
            Ok(FIVE_QUESTIONS.into()),
        ]));
        let engine = engine(provider.clone(), EngineConfig::default());
        let err = engine.generate_quiz(&request(content(200), 5)).await.unwrap_err();
        assert!(matches!(err, QuizError::ModelCall(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_retried_when_enabled() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::NetworkError("connection reset".into())),
            Ok(FIVE_QUESTIONS.into()),
        ]));
        let config = EngineConfig {
            max_retries: 2,
            ..EngineConfig::default()
        };
        let quiz = engine(provider.clone(), config)
            .generate_quiz(&request(content(200), 5))
            .await
            .unwrap();
        assert_eq!(quiz.len(), 5);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::AuthenticationFailed("bad key".into())),
            Ok(FIVE_QUESTIONS.into()),
        ]));
        let config = EngineConfig {
            max_retries: 3,
            ..EngineConfig::default()
        };
        let err = engine(provider.clone(), config)
            .generate_quiz(&request(content(200), 5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out() {
        let mut provider = ScriptedProvider::ok(FIVE_QUESTIONS);
        provider.delay = Some(Duration::from_secs(30));
        let config = EngineConfig {
            timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        };
        let err = engine(Arc::new(provider), config)
            .generate_quiz(&request(content(200), 5))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::ModelTimeout(5)));
    }

    #[tokio::test]
    async fn partial_response_keeps_requested_shape() {
        let raw = "Q1. Only one?\na) x\nb) y\nc) z\nd) w\nAnswer Key:\n1. c\n";
        let provider = Arc::new(ScriptedProvider::ok(raw));
        let quiz = engine(provider, EngineConfig::default())
            .generate_quiz(&request(content(200), 3))
            .await
            .unwrap();
        assert_eq!(quiz.len(), 3);
        assert_eq!(quiz.usable_question_count(), 1);
        assert_eq!(quiz.unusable_questions(), vec![2, 3]);
    }

    #[tokio::test]
    async fn submit_stores_attempt_with_analysis() {
        let provider = Arc::new(ScriptedProvider::ok("  Strong on basics.  "));
        let engine = engine(provider, EngineConfig::default());
        let store = MemoryStore::new();

        let mut session = QuizSession::new(quiz_with_key(&[Some(A), Some(B)]), content(200));
        session.answer_str(1, "A").unwrap();
        let submission = engine.submit(&session, "alice", &store, true).await.unwrap();

        assert_eq!(submission.grade.correct, 1);
        assert_eq!(submission.attempt.analysis(), Some("Strong on basics."));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn failed_analysis_still_stores_score() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(ProviderError::NetworkError(
            "down".into(),
        ))]));
        let engine = engine(provider, EngineConfig::default());
        let store = MemoryStore::new();

        let session = QuizSession::new(quiz_with_key(&[Some(A)]), content(200));
        let submission = engine.submit(&session, "bob", &store, true).await.unwrap();
        assert!(submission.attempt.analysis().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn session_tracks_unanswered_and_validates() {
        let mut session = QuizSession::new(quiz_with_key(&[Some(A), Some(B), Some(C)]), "text");
        assert_eq!(session.unanswered(), vec![1, 2, 3]);

        session.answer(2, B).unwrap();
        session.answer_str(3, " d ").unwrap();
        assert_eq!(session.unanswered(), vec![1]);
        assert!(!session.is_complete());

        assert!(matches!(
            session.answer(4, A),
            Err(QuizError::QuestionOutOfRange { number: 4, count: 3 })
        ));
        assert!(matches!(session.answer(0, A), Err(QuizError::QuestionOutOfRange { .. })));
        assert!(matches!(session.answer_str(1, "e"), Err(QuizError::InvalidAnswer(_))));

        session.clear(2).unwrap();
        assert_eq!(session.answers(), &[None, None, Some(D)]);
    }
}
