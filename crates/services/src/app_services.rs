use std::sync::Arc;

use storage::repository::Storage;

use crate::config::QuizConfig;
use crate::error::AppServicesError;
use crate::queue::ErrorHook;
use crate::remote::{FavoriteApi, HttpQuizApi, QuestionGenerator, SessionApi};
use crate::sessions::{LocalSessionService, QuizSessionService};

/// Remote collaborators consumed by the quiz workflow.
#[derive(Clone)]
pub struct RemoteServices {
    pub generator: Arc<dyn QuestionGenerator>,
    pub sessions: Arc<dyn SessionApi>,
    pub favorites: Arc<dyn FavoriteApi>,
}

impl RemoteServices {
    /// One HTTP client serving all three collaborators.
    #[must_use]
    pub fn http(api: HttpQuizApi) -> Self {
        let api = Arc::new(api);
        Self {
            generator: Arc::clone(&api) as Arc<dyn QuestionGenerator>,
            sessions: Arc::clone(&api) as Arc<dyn SessionApi>,
            favorites: api,
        }
    }
}

/// Assembles app-facing services over a storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: QuizConfig,
    local: Arc<LocalSessionService>,
    quiz: Arc<QuizSessionService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP quiz API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        config: QuizConfig,
        on_replenish_error: Option<ErrorHook>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let remote = RemoteServices::http(HttpQuizApi::new(config.api.clone()));
        Ok(Self::assemble(storage, remote, config, on_replenish_error))
    }

    #[must_use]
    pub fn assemble(
        storage: Storage,
        remote: RemoteServices,
        config: QuizConfig,
        on_replenish_error: Option<ErrorHook>,
    ) -> Self {
        let local = Arc::new(LocalSessionService::new(
            Arc::clone(&storage.snapshots),
            config.queue.max_queued_questions,
        ));
        let mut quiz = QuizSessionService::new(
            Arc::clone(&local),
            remote.generator,
            remote.sessions,
            remote.favorites,
            config.clone(),
        );
        if let Some(hook) = on_replenish_error {
            quiz = quiz.with_replenish_error_hook(hook);
        }

        Self {
            config,
            local,
            quiz: Arc::new(quiz),
        }
    }

    #[must_use]
    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    #[must_use]
    pub fn local_sessions(&self) -> Arc<LocalSessionService> {
        Arc::clone(&self.local)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.quiz)
    }
}
