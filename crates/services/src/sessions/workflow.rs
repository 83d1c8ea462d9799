use std::sync::{Arc, Mutex, PoisonError};

use quiz_core::model::{Accuracy, CursorStep, OptionId, SessionId, SessionProgress, SessionRecord};
use tokio::sync::Mutex as AsyncMutex;

use super::local::LocalSessionService;
use super::reconcile::{Reconciliation, SessionReconciler};
use super::view::CurrentEntryView;
use crate::access_gate::{AccessDemand, AccessGate};
use crate::config::QuizConfig;
use crate::error::QuizServiceError;
use crate::favorites::FavoriteState;
use crate::queue::{ErrorHook, QuestionQueueProvider, StalenessCheck};
use crate::remote::{FavoriteApi, QuestionGenerator, SessionApi, SessionContext};
use crate::staleness::Generation;

/// Result of submitting the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub correct_option_ids: Vec<OptionId>,
    /// Remote record after the answer; may carry a raised difficulty.
    pub record: SessionRecord,
    pub view: CurrentEntryView,
}

/// Orchestrates one learner's quiz: loading, answering, and navigation.
///
/// Submitting and advancing are serialized, so "next" never starts before the
/// current question's submission has been confirmed or rejected.
pub struct QuizSessionService {
    local: Arc<LocalSessionService>,
    generator: Arc<dyn QuestionGenerator>,
    sessions: Arc<dyn SessionApi>,
    favorites: Arc<dyn FavoriteApi>,
    config: QuizConfig,
    reconciler: SessionReconciler,
    gate: AccessGate,
    favorite_state: FavoriteState,
    provider: Mutex<Option<Arc<QuestionQueueProvider>>>,
    // Latest remote record; authoritative for difficulty and answer counters.
    record: Mutex<Option<SessionRecord>>,
    session_generation: Generation,
    step_lock: AsyncMutex<()>,
    on_replenish_error: Option<ErrorHook>,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        local: Arc<LocalSessionService>,
        generator: Arc<dyn QuestionGenerator>,
        sessions: Arc<dyn SessionApi>,
        favorites: Arc<dyn FavoriteApi>,
        config: QuizConfig,
    ) -> Self {
        let reconciler = SessionReconciler::new(Arc::clone(&local), Arc::clone(&sessions));
        Self {
            local,
            generator,
            sessions,
            favorites,
            config,
            reconciler,
            gate: AccessGate::new(),
            favorite_state: FavoriteState::new(),
            provider: Mutex::new(None),
            record: Mutex::new(None),
            session_generation: Generation::new(),
            step_lock: AsyncMutex::new(()),
            on_replenish_error: None,
        }
    }

    /// Observe background replenishment failures.
    #[must_use]
    pub fn with_replenish_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_replenish_error = Some(hook);
        self
    }

    #[must_use]
    pub fn access_demand(&self) -> Option<AccessDemand> {
        self.gate.demand()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.provider_slot().as_ref().map(|provider| provider.session_id())
    }

    /// Resume the locally stored session if the remote still knows it.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` when the session lookup or the question load
    /// fails.
    pub async fn resume(&self) -> Result<Option<CurrentEntryView>, QuizServiceError> {
        let reconciliation = self
            .reconciler
            .reconcile()
            .await
            .map_err(|err| self.gate.intercept(err))?;
        match reconciliation {
            Reconciliation::NoActiveSession => Ok(None),
            Reconciliation::Active(active) => {
                let context = SessionContext::from_record(&active.record);
                let view = self.start(context).await?;
                *self.record_slot() = Some(active.record);
                Ok(Some(view))
            }
        }
    }

    /// Begin (or resume) the session described by `context`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::AccessDenied` on 403/429 and
    /// `QuizServiceError::Remote` for other load failures.
    pub async fn start(&self, context: SessionContext) -> Result<CurrentEntryView, QuizServiceError> {
        let _step = self.step_lock.lock().await;
        self.retire_provider();
        self.record_slot().take();

        let session_id = context.session_id.clone();
        let mut provider = QuestionQueueProvider::new(
            Arc::clone(&self.local),
            Arc::clone(&self.generator),
            self.config.queue,
            context,
        )
        .with_styles(self.config.question_styles.clone());
        if let Some(hook) = &self.on_replenish_error {
            provider = provider.with_error_hook(Arc::clone(hook));
        }
        let provider = Arc::new(provider);
        *self.provider_slot() = Some(Arc::clone(&provider));

        let outcome = provider
            .initialize()
            .await
            .map_err(|err| self.gate.intercept(err))?;
        self.gate.clear();
        tracing::info!(session_id = %session_id, restored = outcome.restored, "quiz session started");
        self.show(&outcome.view);
        Ok(outcome.view)
    }

    /// Question under the cursor, if any.
    pub async fn current(&self) -> Option<CurrentEntryView> {
        let session_id = self.session_id()?;
        self.local.read_current(&session_id).await
    }

    /// Replace the learner's selection on the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` while a demand is outstanding, without a
    /// current question, or once it was submitted.
    pub async fn select_options(
        &self,
        selected: Vec<OptionId>,
    ) -> Result<CurrentEntryView, QuizServiceError> {
        self.gate.ensure_open()?;
        let session_id = self.session_id().ok_or(QuizServiceError::NoActiveSession)?;
        let current = self
            .local
            .read_current(&session_id)
            .await
            .ok_or(QuizServiceError::NoCurrentQuestion)?;
        if current.has_submitted {
            return Err(QuizServiceError::AlreadySubmitted);
        }
        self.local
            .write_selection(&session_id, selected)
            .await
            .ok_or(QuizServiceError::LocalState)
    }

    /// Record the current answer remotely, then mark it submitted locally.
    ///
    /// Nothing changes locally when the remote call fails.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` for precondition failures, access demands,
    /// and remote failures.
    pub async fn submit(&self) -> Result<SubmitOutcome, QuizServiceError> {
        self.gate.ensure_open()?;
        let _step = self.step_lock.lock().await;
        let provider = self.active_provider()?;
        let session_id = provider.session_id();

        let current = self
            .local
            .read_current(&session_id)
            .await
            .ok_or(QuizServiceError::NoCurrentQuestion)?;
        if current.has_submitted {
            return Err(QuizServiceError::AlreadySubmitted);
        }
        if current.selected_option_ids.is_empty() {
            return Err(QuizServiceError::EmptySelection);
        }

        let is_correct = current
            .question
            .is_correct_selection(&current.selected_option_ids);
        let record = self
            .sessions
            .record_answer(&session_id, is_correct)
            .await
            .map_err(|err| self.gate.intercept(err))?;

        let view = self
            .local
            .mark_submitted(&session_id)
            .await
            .ok_or(QuizServiceError::LocalState)?;

        let previous = provider.difficulty();
        if previous != record.difficulty() {
            tracing::info!(session_id = %session_id, from = %previous, to = %record.difficulty(), "difficulty changed");
        }
        provider.set_difficulty(record.difficulty());
        *self.record_slot() = Some(record.clone());

        Ok(SubmitOutcome {
            is_correct,
            correct_option_ids: view.question.correct_option_ids().to_vec(),
            record,
            view,
        })
    }

    /// Advance to the next question: buffered if possible, fetched otherwise.
    ///
    /// While a demand is outstanding the buffer is skipped, so only a fresh
    /// successful load lifts it.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotSubmitted` before the current question is
    /// submitted, and load failures from the direct fetch.
    pub async fn next(&self) -> Result<CurrentEntryView, QuizServiceError> {
        let _step = self.step_lock.lock().await;
        let provider = self.active_provider()?;
        let session_id = provider.session_id();

        let current = self
            .local
            .read_current(&session_id)
            .await
            .ok_or(QuizServiceError::NoCurrentQuestion)?;
        if !current.has_submitted {
            return Err(QuizServiceError::NotSubmitted);
        }

        if !self.gate.is_blocked() {
            if let Some(view) = self.local.consume_queued_question(&session_id).await {
                self.replenish(&provider);
                self.show(&view);
                return Ok(view);
            }
        }

        tracing::debug!(session_id = %session_id, "buffer empty; fetching directly");
        let question = provider
            .fetch_question(true)
            .await
            .map_err(|err| self.gate.intercept(err))?;
        self.gate.clear();

        // Buffered entries would otherwise sit unanswered behind the cursor.
        let view = match self.local.write_question_over_queue(question.clone()).await {
            Some(view) => view,
            None => CurrentEntryView::detached(session_id, question),
        };
        self.replenish(&provider);
        self.show(&view);
        Ok(view)
    }

    /// Step back to the previous question.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NoPreviousQuestion` at the first question.
    pub async fn previous(&self) -> Result<CurrentEntryView, QuizServiceError> {
        let _step = self.step_lock.lock().await;
        let session_id = self.session_id().ok_or(QuizServiceError::NoActiveSession)?;
        let view = self
            .local
            .shift_question(&session_id, CursorStep::Back)
            .await
            .ok_or(QuizServiceError::NoPreviousQuestion)?;
        self.show(&view);
        Ok(view)
    }

    /// Flip the favorite flag of the displayed question.
    ///
    /// `Ok(None)` when the learner moved on before the remote answered.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError` for remote failures on a still-displayed question.
    pub async fn toggle_favorite(&self) -> Result<Option<bool>, QuizServiceError> {
        self.favorite_state
            .toggle(self.favorites.as_ref())
            .await
            .map_err(|err| self.gate.intercept(err))
    }

    #[must_use]
    pub fn is_favorite(&self) -> Option<bool> {
        self.favorite_state.is_favorite()
    }

    /// Remote record last seen for the active session, from resume or submit.
    #[must_use]
    pub fn session_record(&self) -> Option<SessionRecord> {
        let session_id = self.session_id()?;
        self.record_slot()
            .as_ref()
            .filter(|record| record.id() == &session_id)
            .cloned()
    }

    /// Answer counters, from the remote record when one is known and from the
    /// local snapshot otherwise.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NoActiveSession` without a stored session.
    pub async fn accuracy(&self) -> Result<Accuracy, QuizServiceError> {
        let session_id = self.session_id().ok_or(QuizServiceError::NoActiveSession)?;
        if let Some(record) = self.session_record() {
            return Ok(Accuracy {
                submitted_count: record.submitted_count(),
                correct_count: record.correct_count(),
            });
        }
        self.local
            .read_accuracy(&session_id)
            .await
            .ok_or(QuizServiceError::NoActiveSession)
    }

    /// # Errors
    ///
    /// Returns `QuizServiceError::NoActiveSession` without a stored session.
    pub async fn progress(&self) -> Result<SessionProgress, QuizServiceError> {
        let session_id = self.session_id().ok_or(QuizServiceError::NoActiveSession)?;
        self.local
            .read_progress(&session_id)
            .await
            .ok_or(QuizServiceError::NoActiveSession)
    }

    /// Finish the session and wipe local state.
    pub async fn end(&self) {
        let _step = self.step_lock.lock().await;
        let session_id = self.session_id();
        self.retire_provider();
        self.record_slot().take();
        self.favorite_state.deactivate();
        self.local.clear_session().await;
        if let Some(session_id) = session_id {
            tracing::info!(session_id = %session_id, "quiz session ended");
        }
    }

    fn provider_slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<QuestionQueueProvider>>> {
        self.provider.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_slot(&self) -> std::sync::MutexGuard<'_, Option<SessionRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_provider(&self) -> Result<Arc<QuestionQueueProvider>, QuizServiceError> {
        self.provider_slot()
            .as_ref()
            .map(Arc::clone)
            .ok_or(QuizServiceError::NoActiveSession)
    }

    fn retire_provider(&self) {
        let retired = self.provider_slot().take();
        if let Some(provider) = retired {
            provider.clear();
        }
        self.session_generation.advance();
    }

    fn replenish(&self, provider: &Arc<QuestionQueueProvider>) {
        let token = self.session_generation.token();
        let stale: StalenessCheck = Arc::new(move || !token.is_current());
        if provider.on_question_consumed(Some(stale)).is_none() {
            tracing::debug!("replenishment skipped");
        }
    }

    fn show(&self, view: &CurrentEntryView) {
        self.favorite_state.activate(view.question.id().clone());
    }
}
