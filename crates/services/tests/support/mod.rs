#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    Difficulty, Question, QuestionId, QuestionType, SessionId, SessionRecord,
};
use services::{
    FavoriteApi, GenerateQuestionRequest, LocalSessionService, QueueConfig, QuestionGenerator,
    QuizConfig, QuizSessionService, RemoteError, SessionApi, SessionContext,
};
use storage::repository::InMemoryRepository;

pub fn status(code: u16) -> RemoteError {
    RemoteError::Status {
        status: code,
        message: format!("status {code}"),
    }
}

/// Generator producing `q1`, `q2`, ... with option "right" correct.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
    pub failures: Mutex<VecDeque<RemoteError>>,
    pub requests: Mutex<Vec<GenerateQuestionRequest>>,
}

impl ScriptedGenerator {
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateQuestionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerateQuestionRequest) -> Result<Question, RemoteError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(Question::new(
            QuestionId::new(format!("q{n}")),
            format!("question {n}"),
            QuestionType::SingleChoice,
            vec!["wrong".into(), "right".into(), "nope".into()],
            &[1],
        )
        .unwrap())
    }
}

/// Remote sessions keyed by the id they are looked up with.
#[derive(Default)]
pub struct FakeSessions {
    pub records: Mutex<HashMap<String, SessionRecord>>,
    pub fetches: AtomicUsize,
    pub answers: AtomicUsize,
    pub failures: Mutex<VecDeque<RemoteError>>,
    /// Difficulty reported once this many correct answers were recorded.
    pub raise_after: Option<u32>,
}

impl FakeSessions {
    pub fn with_record(record: SessionRecord) -> Self {
        let sessions = Self::default();
        let key = record.id().as_str().to_owned();
        sessions.insert(&key, record);
        sessions
    }

    pub fn insert(&self, key: &str, record: SessionRecord) {
        self.records.lock().unwrap().insert(key.to_owned(), record);
    }

    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl SessionApi for FakeSessions {
    async fn fetch_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.records.lock().unwrap().get(id.as_str()).cloned())
    }

    async fn record_answer(
        &self,
        id: &SessionId,
        is_correct: bool,
    ) -> Result<SessionRecord, RemoteError> {
        self.answers.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut records = self.records.lock().unwrap();
        let current = records
            .get(id.as_str())
            .cloned()
            .unwrap_or_else(|| record(id.as_str(), Difficulty::Easy, 0, 0));
        let submitted = current.submitted_count() + 1;
        let correct = current.correct_count() + u32::from(is_correct);
        let difficulty = match self.raise_after {
            Some(threshold) if correct >= threshold => Difficulty::Medium,
            _ => current.difficulty(),
        };
        let updated = SessionRecord::new(
            id.clone(),
            difficulty,
            submitted,
            correct,
            current.subject_id(),
            current.subcategory_id(),
        )
        .unwrap();
        records.insert(id.as_str().to_owned(), updated.clone());
        Ok(updated)
    }
}

/// Favorites backend echoing the requested flag unless a failure is queued.
#[derive(Default)]
pub struct EchoFavorites {
    pub failures: Mutex<VecDeque<RemoteError>>,
}

impl EchoFavorites {
    pub fn fail_next(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }
}

#[async_trait]
impl FavoriteApi for EchoFavorites {
    async fn set_favorite(&self, _: &QuestionId, favorite: bool) -> Result<bool, RemoteError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(favorite)
    }
}

pub fn record(id: &str, difficulty: Difficulty, submitted: u32, correct: u32) -> SessionRecord {
    SessionRecord::new(
        SessionId::new(id),
        difficulty,
        submitted,
        correct,
        "math",
        "algebra",
    )
    .unwrap()
}

pub fn context(id: &str) -> SessionContext {
    SessionContext::from_record(&record(id, Difficulty::Easy, 0, 0))
}

pub fn config(min_queued: usize, max_queued: usize) -> QuizConfig {
    QuizConfig {
        api: None,
        queue: QueueConfig {
            min_queued_questions: min_queued,
            max_queued_questions: max_queued,
        },
        question_styles: Vec::new(),
    }
}

pub struct Harness {
    pub repo: InMemoryRepository,
    pub local: Arc<LocalSessionService>,
    pub generator: Arc<ScriptedGenerator>,
    pub sessions: Arc<FakeSessions>,
    pub favorites: Arc<EchoFavorites>,
    pub quiz: QuizSessionService,
}

impl Harness {
    pub fn new(config: QuizConfig, sessions: FakeSessions) -> Self {
        Self::over(InMemoryRepository::new(), config, sessions)
    }

    /// A fresh workflow over an existing slot, like a reloaded client.
    pub fn over(repo: InMemoryRepository, config: QuizConfig, sessions: FakeSessions) -> Self {
        let local = Arc::new(LocalSessionService::new(
            Arc::new(repo.clone()),
            config.queue.max_queued_questions,
        ));
        let generator = Arc::new(ScriptedGenerator::default());
        let sessions = Arc::new(sessions);
        let favorites = Arc::new(EchoFavorites::default());
        let quiz = QuizSessionService::new(
            Arc::clone(&local),
            Arc::clone(&generator) as Arc<dyn QuestionGenerator>,
            Arc::clone(&sessions) as Arc<dyn SessionApi>,
            Arc::clone(&favorites) as Arc<dyn FavoriteApi>,
            config,
        );
        Self {
            repo,
            local,
            generator,
            sessions,
            favorites,
            quiz,
        }
    }

    /// Wait until the background prefetch has buffered `queued` questions.
    pub async fn wait_for_queued(&self, session_id: &str, queued: usize) {
        let session_id = SessionId::new(session_id);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let progress = self.local.read_progress(&session_id).await;
                if progress.is_some_and(|p| p.queued >= queued) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("prefetch did not complete");
    }
}
