use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use quiz_core::model::{Question, QuestionId, QuestionType, SessionId, SessionRecord};

use super::{FavoriteApi, GenerateQuestionRequest, QuestionGenerator, SessionApi};
use crate::config::QuizApiConfig;
use crate::error::RemoteError;

/// `reqwest` client for the generator, session, and favorite endpoints.
#[derive(Clone)]
pub struct HttpQuizApi {
    client: Client,
    config: Option<QuizApiConfig>,
}

impl HttpQuizApi {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(QuizApiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<QuizApiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&QuizApiConfig, RemoteError> {
        self.config.as_ref().ok_or(RemoteError::Disabled)
    }

    fn url(&self, path: &str) -> Result<String, RemoteError> {
        let config = self.config()?;
        Ok(format!("{}/{path}", config.base_url.trim_end_matches('/')))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.as_ref().and_then(|c| c.api_token.as_deref()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl QuestionGenerator for HttpQuizApi {
    async fn generate(&self, request: &GenerateQuestionRequest) -> Result<Question, RemoteError> {
        let url = self.url("questions")?;
        let response = self
            .authorize(self.client.post(url).json(request))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: QuestionEnvelope = response.json().await?;
        if let Some(message) = body.error {
            return Err(RemoteError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                message,
            });
        }
        body.question
            .ok_or(RemoteError::MissingField("question"))?
            .into_question()
    }
}

#[async_trait]
impl SessionApi for HttpQuizApi {
    async fn fetch_session(&self, id: &SessionId) -> Result<Option<SessionRecord>, RemoteError> {
        let url = self.url(&format!("sessions/{id}"))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let body: SessionEnvelope = response.json().await?;
        Ok(body.session)
    }

    async fn record_answer(
        &self,
        id: &SessionId,
        is_correct: bool,
    ) -> Result<SessionRecord, RemoteError> {
        let url = self.url("sessions")?;
        let payload = RecordAnswerRequest {
            session_id: id,
            is_correct,
        };
        let response = self
            .authorize(self.client.patch(url).json(&payload))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: SessionEnvelope = response.json().await?;
        body.session.ok_or(RemoteError::MissingField("session"))
    }
}

#[async_trait]
impl FavoriteApi for HttpQuizApi {
    async fn set_favorite(
        &self,
        question_id: &QuestionId,
        favorite: bool,
    ) -> Result<bool, RemoteError> {
        let url = self.url(&format!("favorites/{question_id}"))?;
        let response = self
            .authorize(self.client.put(url).json(&FavoritePayload { favorite }))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body: FavoritePayload = response.json().await?;
        Ok(body.favorite)
    }
}

async fn ensure_success(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status.as_u16(), &body))
}

/// Build a status error, preferring the `{ "error": ... }` message when present.
fn status_error(status: u16, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    RemoteError::Status { status, message }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordAnswerRequest<'a> {
    session_id: &'a SessionId,
    is_correct: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct FavoritePayload {
    favorite: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: Option<SessionRecord>,
}

#[derive(Debug, Deserialize)]
struct QuestionEnvelope {
    question: Option<GeneratedQuestion>,
    error: Option<String>,
}

/// Generator payload: option texts plus the indexes of the correct ones.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    id: String,
    prompt: String,
    question_type: QuestionType,
    options: Vec<String>,
    correct_option_indexes: Vec<usize>,
    #[serde(default)]
    explanation: Option<String>,
}

impl GeneratedQuestion {
    fn into_question(self) -> Result<Question, RemoteError> {
        let question = Question::new(
            QuestionId::new(self.id),
            self.prompt,
            self.question_type,
            self.options,
            &self.correct_option_indexes,
        )
        .map_err(quiz_core::Error::from)?;
        Ok(match self.explanation {
            Some(explanation) => question.with_explanation(explanation),
            None => question,
        })
    }
}
