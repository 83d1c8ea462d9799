//! Shared error types for the services crate.

use storage::sqlite::SqliteInitError;
use thiserror::Error;

use crate::access_gate::AccessDemand;

/// Errors returned by remote collaborators (generator, session, favorites).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("remote quiz service is not configured")]
    Disabled,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    InvalidPayload(#[from] quiz_core::Error),
}

impl RemoteError {
    /// HTTP-like status code carried by the failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RemoteError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => RemoteError::Transport(err.to_string()),
        }
    }
}

/// Errors emitted by the quiz workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("access blocked until {0} is resolved")]
    AccessDenied(AccessDemand),
    #[error("no active session")]
    NoActiveSession,
    #[error("no current question")]
    NoCurrentQuestion,
    #[error("no earlier question")]
    NoPreviousQuestion,
    #[error("current question already submitted")]
    AlreadySubmitted,
    #[error("current question must be submitted before advancing")]
    NotSubmitted,
    #[error("no option selected")]
    EmptySelection,
    #[error("local session state could not be updated")]
    LocalState,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors raised while wiring app-facing services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
