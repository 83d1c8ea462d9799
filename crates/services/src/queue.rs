//! Background prefetch keeping the look-ahead buffer above a watermark.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{Difficulty, Question, SessionId};
use quiz_core::shuffle::seed_key;
use quiz_core::{StyleRotation, shuffle_question};
use tokio::task::JoinHandle;

use crate::config::QueueConfig;
use crate::error::RemoteError;
use crate::remote::{QuestionGenerator, SessionContext};
use crate::sessions::{CurrentEntryView, LocalSessionService};
use crate::staleness::{Generation, GenerationToken};

/// Receives replenishment failures that were not discarded as stale.
pub type ErrorHook = Arc<dyn Fn(&RemoteError) + Send + Sync>;

/// Returns `true` when a result should be ignored.
pub type StalenessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Result of [`QuestionQueueProvider::initialize`].
#[derive(Debug)]
pub struct InitializeOutcome {
    pub view: CurrentEntryView,
    /// `true` when the current question came from the local snapshot.
    pub restored: bool,
    /// Fire-and-forget prefetch of the first look-ahead question.
    pub prefetch: Option<JoinHandle<()>>,
}

pub struct QuestionQueueProvider {
    local: Arc<LocalSessionService>,
    generator: Arc<dyn QuestionGenerator>,
    queue: QueueConfig,
    styles: Vec<String>,
    context: Mutex<SessionContext>,
    rotation: Mutex<StyleRotation>,
    replenishing: AtomicBool,
    generation: Generation,
    live: GenerationToken,
    on_error: Option<ErrorHook>,
}

impl QuestionQueueProvider {
    #[must_use]
    pub fn new(
        local: Arc<LocalSessionService>,
        generator: Arc<dyn QuestionGenerator>,
        queue: QueueConfig,
        context: SessionContext,
    ) -> Self {
        let generation = Generation::new();
        let live = generation.token();
        Self {
            local,
            generator,
            queue: queue.normalized(),
            styles: Vec::new(),
            context: Mutex::new(context),
            rotation: Mutex::new(StyleRotation::new()),
            replenishing: AtomicBool::new(false),
            generation,
            live,
            on_error: None,
        }
    }

    #[must_use]
    pub fn with_styles(mut self, styles: Vec<String>) -> Self {
        self.styles = styles;
        self
    }

    #[must_use]
    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .session_id
            .clone()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .difficulty
    }

    /// Later generation requests use `difficulty`.
    pub fn set_difficulty(&self, difficulty: Difficulty) {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .difficulty = difficulty;
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.live.is_current()
    }

    /// Dispose the provider; in-flight replenishments resolve as no-ops.
    pub fn clear(&self) {
        self.generation.advance();
        self.rotation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        tracing::debug!(session_id = %self.session_id(), "question queue disposed");
    }

    /// Generate one question with its options shuffled for this session.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` when the generator fails.
    pub async fn fetch_question(&self, next: bool) -> Result<Question, RemoteError> {
        let request = {
            let context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
            let style = self
                .rotation
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_style(&context.subject_id, context.difficulty, &self.styles)
                .map(str::to_owned);
            context.request(next, style)
        };
        let question = self.generator.generate(&request).await?;
        let key = seed_key(&request.session_id, question.id());
        Ok(shuffle_question(&question, &key).question)
    }

    /// Restore the current question or load one, then prefetch a look-ahead.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` when nothing could be restored and the generator fails.
    pub async fn initialize(self: &Arc<Self>) -> Result<InitializeOutcome, RemoteError> {
        let session_id = self.session_id();
        self.local.write_session(&session_id).await;

        if let Some(view) = self.local.read_current(&session_id).await {
            tracing::debug!(session_id = %session_id, "restored current question");
            return Ok(InitializeOutcome {
                view,
                restored: true,
                prefetch: None,
            });
        }

        let question = self.fetch_question(false).await?;
        let view = match self.local.write_question(question.clone()).await {
            Some(view) => view,
            None => CurrentEntryView::detached(session_id, question),
        };
        Ok(InitializeOutcome {
            view,
            restored: false,
            prefetch: Some(self.spawn_replenish(None)),
        })
    }

    /// Start a background replenishment after a buffered question was consumed.
    ///
    /// Nothing is spawned once disposed, or when `should_ignore` already says
    /// the result would be thrown away.
    pub fn on_question_consumed(
        self: &Arc<Self>,
        should_ignore: Option<StalenessCheck>,
    ) -> Option<JoinHandle<()>> {
        if self.is_disposed() || should_ignore.as_ref().is_some_and(|check| check()) {
            return None;
        }
        Some(self.spawn_replenish(should_ignore))
    }

    fn spawn_replenish(self: &Arc<Self>, should_ignore: Option<StalenessCheck>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move { provider.replenish(should_ignore).await })
    }

    async fn replenish(&self, should_ignore: Option<StalenessCheck>) {
        if self.replenishing.swap(true, Ordering::AcqRel) {
            tracing::debug!("replenishment already in flight");
            return;
        }
        let _running = ReplenishGuard(&self.replenishing);

        let session_id = self.session_id();
        let Some(progress) = self.local.read_progress(&session_id).await else {
            return;
        };
        if progress.queued >= self.queue.min_queued_questions {
            return;
        }

        let result = self.fetch_question(true).await;
        let discard =
            self.is_disposed() || should_ignore.as_ref().is_some_and(|check| check());

        match result {
            Ok(question) if !discard => {
                if self.local.enqueue_question(&session_id, question).await.is_none() {
                    tracing::debug!(session_id = %session_id, "session gone before enqueue");
                }
            }
            Err(err) if !discard => {
                tracing::warn!(session_id = %session_id, error = %err, "question replenishment failed");
                if let Some(hook) = &self.on_error {
                    hook(&err);
                }
            }
            _ => {
                tracing::debug!(session_id = %session_id, "discarding stale replenishment");
            }
        }
    }
}

struct ReplenishGuard<'a>(&'a AtomicBool);

impl Drop for ReplenishGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{QuestionId, QuestionType};
    use std::sync::atomic::AtomicUsize;
    use storage::repository::InMemoryRepository;
    use tokio::sync::Notify;

    use crate::remote::GenerateQuestionRequest;

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Notify>>,
        styles: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl QuestionGenerator for CountingGenerator {
        async fn generate(&self, request: &GenerateQuestionRequest) -> Result<Question, RemoteError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.styles.lock().unwrap().push(request.style.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(RemoteError::Status {
                    status: 500,
                    message: "generator down".into(),
                });
            }
            Ok(Question::new(
                QuestionId::new(format!("q{n}")),
                format!("prompt {n}"),
                QuestionType::SingleChoice,
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                &[1],
            )
            .unwrap())
        }
    }

    fn context() -> SessionContext {
        SessionContext {
            session_id: SessionId::new("s1"),
            subject_id: "math".into(),
            subcategory_id: "algebra".into(),
            difficulty: Difficulty::Easy,
        }
    }

    fn provider(generator: Arc<CountingGenerator>) -> (Arc<QuestionQueueProvider>, Arc<LocalSessionService>) {
        let local = Arc::new(LocalSessionService::new(
            Arc::new(InMemoryRepository::new()),
            3,
        ));
        let provider = QuestionQueueProvider::new(
            Arc::clone(&local),
            generator,
            QueueConfig {
                min_queued_questions: 2,
                max_queued_questions: 3,
            },
            context(),
        );
        (Arc::new(provider), local)
    }

    #[tokio::test]
    async fn initialize_loads_then_prefetches_once() {
        let generator = Arc::new(CountingGenerator::default());
        let (provider, local) = provider(Arc::clone(&generator));

        let outcome = provider.initialize().await.unwrap();
        assert!(!outcome.restored);
        outcome.prefetch.unwrap().await.unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        let progress = local.read_progress(&SessionId::new("s1")).await.unwrap();
        assert_eq!(progress.queued, 1);
    }

    #[tokio::test]
    async fn initialize_restores_without_network() {
        let generator = Arc::new(CountingGenerator::default());
        let (provider, _local) = provider(Arc::clone(&generator));
        let first = provider.initialize().await.unwrap();
        first.prefetch.unwrap().await.unwrap();
        let calls = generator.calls.load(Ordering::SeqCst);

        let again = provider.initialize().await.unwrap();
        assert!(again.restored);
        assert_eq!(again.view.question.id(), first.view.question.id());
        assert_eq!(generator.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn loaded_questions_are_shuffled_deterministically() {
        let generator = Arc::new(CountingGenerator::default());
        let (provider, _local) = provider(generator);
        let question = provider.fetch_question(true).await.unwrap();
        let expected = shuffle_question(
            &Question::new(
                QuestionId::new("q1"),
                "prompt 1",
                QuestionType::SingleChoice,
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                &[1],
            )
            .unwrap(),
            "s1:q1",
        );
        assert_eq!(question, expected.question);
        let correct = &question.correct_option_ids()[0];
        assert_eq!(question.option_text(correct), Some("b"));
    }

    #[tokio::test]
    async fn concurrent_trigger_is_a_no_op() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(CountingGenerator {
            gate: Some(Arc::clone(&gate)),
            ..CountingGenerator::default()
        });
        let (provider, local) = provider(Arc::clone(&generator));
        let sid = SessionId::new("s1");
        local.write_session(&sid).await;
        local.write_question(current_question()).await;

        let first = provider.on_question_consumed(None).unwrap();
        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        let second = provider.on_question_consumed(None).unwrap();
        second.await.unwrap();

        gate.notify_one();
        first.await.unwrap();
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disposed_provider_drops_in_flight_result() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(CountingGenerator {
            gate: Some(Arc::clone(&gate)),
            ..CountingGenerator::default()
        });
        let (provider, local) = provider(Arc::clone(&generator));
        let sid = SessionId::new("s1");
        local.write_session(&sid).await;
        local.write_question(current_question()).await;

        let task = provider.on_question_consumed(None).unwrap();
        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        provider.clear();
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(local.read_progress(&sid).await.unwrap().queued, 0);
        assert!(provider.on_question_consumed(None).is_none());
    }

    fn hooked_provider(
        generator: Arc<CountingGenerator>,
        seen: &Arc<AtomicUsize>,
    ) -> (Arc<QuestionQueueProvider>, Arc<LocalSessionService>) {
        let local = Arc::new(LocalSessionService::new(Arc::new(InMemoryRepository::new()), 3));
        let hook_seen = Arc::clone(seen);
        let provider = QuestionQueueProvider::new(
            Arc::clone(&local),
            generator,
            QueueConfig::default(),
            context(),
        )
        .with_error_hook(Arc::new(move |_err: &RemoteError| {
            hook_seen.fetch_add(1, Ordering::SeqCst);
        }));
        (Arc::new(provider), local)
    }

    #[tokio::test]
    async fn failures_reach_the_hook() {
        let generator = Arc::new(CountingGenerator {
            fail: true,
            ..CountingGenerator::default()
        });
        let seen = Arc::new(AtomicUsize::new(0));
        let (provider, local) = hooked_provider(generator, &seen);
        local.write_session(&SessionId::new("s1")).await;

        provider.on_question_consumed(None).unwrap().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_failures_are_swallowed_silently() {
        let gate = Arc::new(Notify::new());
        let generator = Arc::new(CountingGenerator {
            fail: true,
            gate: Some(Arc::clone(&gate)),
            ..CountingGenerator::default()
        });
        let seen = Arc::new(AtomicUsize::new(0));
        let (provider, local) = hooked_provider(Arc::clone(&generator), &seen);
        local.write_session(&SessionId::new("s1")).await;

        let stale = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stale);
        let check: StalenessCheck = Arc::new(move || flag.load(Ordering::SeqCst));
        let task = provider.on_question_consumed(Some(check)).unwrap();
        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        stale.store(true, Ordering::SeqCst);
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn already_stale_trigger_spawns_nothing() {
        let generator = Arc::new(CountingGenerator::default());
        let (provider, _local) = provider(Arc::clone(&generator));
        let check: StalenessCheck = Arc::new(|| true);
        assert!(provider.on_question_consumed(Some(check)).is_none());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn style_hints_rotate_per_request() {
        let generator = Arc::new(CountingGenerator::default());
        let local = Arc::new(LocalSessionService::new(Arc::new(InMemoryRepository::new()), 3));
        let provider = QuestionQueueProvider::new(
            local,
            Arc::clone(&generator) as Arc<dyn QuestionGenerator>,
            QueueConfig::default(),
            context(),
        )
        .with_styles(vec!["scenario".into(), "definition".into()]);

        for _ in 0..3 {
            provider.fetch_question(true).await.unwrap();
        }
        let styles = generator.styles.lock().unwrap().clone();
        assert_eq!(
            styles,
            vec![
                Some("scenario".to_string()),
                Some("definition".to_string()),
                Some("scenario".to_string()),
            ]
        );
    }

    fn current_question() -> Question {
        Question::new(
            QuestionId::new("current"),
            "current",
            QuestionType::TrueFalse,
            vec!["true".into(), "false".into()],
            &[0],
        )
        .unwrap()
    }
}
