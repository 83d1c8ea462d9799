//! Turns quota/authentication failures into UI-blocking demands.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::{QuizServiceError, RemoteError};

/// What the learner must do before answering more questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDemand {
    /// Anonymous-tier volume limit reached; signing in unlocks more questions.
    MoreQuestions,
    /// Paid-tier quota reached.
    UpgradePro,
}

impl AccessDemand {
    /// `403 → MoreQuestions`, `429 → UpgradePro`, anything else is not a demand.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            403 => Some(AccessDemand::MoreQuestions),
            429 => Some(AccessDemand::UpgradePro),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessDemand::MoreQuestions => "more_questions",
            AccessDemand::UpgradePro => "upgrade_pro",
        }
    }
}

impl fmt::Display for AccessDemand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demand carried by a remote failure, if any.
#[must_use]
pub fn resolve(error: &RemoteError) -> Option<AccessDemand> {
    error.status().and_then(AccessDemand::from_status)
}

/// Current demand for one quiz client.
///
/// Set by [`AccessGate::intercept`] and cleared as soon as a load succeeds.
#[derive(Debug, Default)]
pub struct AccessGate {
    demand: Mutex<Option<AccessDemand>>,
}

impl AccessGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn demand(&self) -> Option<AccessDemand> {
        *self.demand.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.demand().is_some()
    }

    /// Route a remote failure: demands are recorded and returned as
    /// `AccessDenied`, everything else passes through as a generic failure.
    pub fn intercept(&self, error: RemoteError) -> QuizServiceError {
        match resolve(&error) {
            Some(demand) => {
                tracing::info!(%demand, "remote call requires learner action");
                *self.demand.lock().unwrap_or_else(PoisonError::into_inner) = Some(demand);
                QuizServiceError::AccessDenied(demand)
            }
            None => QuizServiceError::Remote(error),
        }
    }

    /// Fail fast while a demand is outstanding.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::AccessDenied` with the outstanding demand.
    pub fn ensure_open(&self) -> Result<(), QuizServiceError> {
        match self.demand() {
            Some(demand) => Err(QuizServiceError::AccessDenied(demand)),
            None => Ok(()),
        }
    }

    pub fn clear(&self) {
        *self.demand.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
