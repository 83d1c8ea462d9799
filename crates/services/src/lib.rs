#![forbid(unsafe_code)]

pub mod access_gate;
pub mod app_services;
pub mod config;
pub mod error;
pub mod favorites;
pub mod queue;
pub mod remote;
pub mod sessions;
pub mod staleness;

pub use access_gate::{AccessDemand, AccessGate};
pub use app_services::{AppServices, RemoteServices};
pub use config::{QueueConfig, QuizApiConfig, QuizConfig};
pub use error::{AppServicesError, QuizServiceError, RemoteError};
pub use queue::{ErrorHook, InitializeOutcome, QuestionQueueProvider, StalenessCheck};
pub use remote::{
    FavoriteApi, GenerateQuestionRequest, HttpQuizApi, QuestionGenerator, SessionApi,
    SessionContext,
};
pub use sessions::{
    ActiveSession, CurrentEntryView, LocalSessionService, QuizSessionService, Reconciliation,
    SessionReconciler, SubmitOutcome,
};
pub use staleness::{ActiveEntity, Generation, GenerationToken, MutationTicket};
