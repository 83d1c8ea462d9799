//! Contracts for the remote collaborators of the quiz client.

mod http;

use async_trait::async_trait;
use serde::Serialize;

use quiz_core::model::{Difficulty, Question, QuestionId, SessionId, SessionRecord};

use crate::error::RemoteError;

pub use http::HttpQuizApi;

/// What the question generator needs to know about the running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub subject_id: String,
    pub subcategory_id: String,
    pub difficulty: Difficulty,
}

impl SessionContext {
    #[must_use]
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            session_id: record.id().clone(),
            subject_id: record.subject_id().to_owned(),
            subcategory_id: record.subcategory_id().to_owned(),
            difficulty: record.difficulty(),
        }
    }

    /// Request for one question. `next = false` is an initial or resumed load.
    #[must_use]
    pub fn request(&self, next: bool, style: Option<String>) -> GenerateQuestionRequest {
        GenerateQuestionRequest {
            session_id: self.session_id.clone(),
            subject_id: self.subject_id.clone(),
            subcategory_id: self.subcategory_id.clone(),
            difficulty: self.difficulty,
            next,
            style,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionRequest {
    pub session_id: SessionId,
    pub subject_id: String,
    pub subcategory_id: String,
    pub difficulty: Difficulty,
    pub next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Slow, fallible question generator.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Generate one question for the session described by `request`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport failures, non-success statuses, or
    /// payloads that do not form a valid question.
    async fn generate(&self, request: &GenerateQuestionRequest) -> Result<Question, RemoteError>;
}

/// Remote session of record.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Fetch a session by id; `Ok(None)` when the remote has no such session.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport failures or non-success statuses.
    async fn fetch_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RemoteError>;

    /// Record one answer; the returned record may carry a raised difficulty.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport failures or non-success statuses.
    async fn record_answer(
        &self,
        id: &SessionId,
        is_correct: bool,
    ) -> Result<SessionRecord, RemoteError>;
}

/// Favorite flag storage for questions.
#[async_trait]
pub trait FavoriteApi: Send + Sync {
    /// Set the favorite flag and return the value the remote now holds.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` for transport failures or non-success statuses.
    async fn set_favorite(&self, question_id: &QuestionId, favorite: bool)
    -> Result<bool, RemoteError>;
}
