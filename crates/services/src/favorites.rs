use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use quiz_core::model::QuestionId;

use crate::error::RemoteError;
use crate::remote::FavoriteApi;
use crate::staleness::ActiveEntity;

/// Favorite flag of the active question, guarded against stale toggles.
///
/// A toggle dispatched for question X that resolves after Y became active is
/// dropped: neither the displayed flag nor the remembered value for X change.
#[derive(Debug, Default)]
pub struct FavoriteState {
    active: ActiveEntity<QuestionId>,
    known: Mutex<HashMap<QuestionId, bool>>,
}

impl FavoriteState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `question_id` the active question.
    pub fn activate(&self, question_id: QuestionId) {
        self.active.activate(question_id);
    }

    pub fn deactivate(&self) {
        self.active.deactivate();
    }

    /// Favorite flag of the active question; `None` when no question is active.
    #[must_use]
    pub fn is_favorite(&self) -> Option<bool> {
        let id = self.active.current()?;
        Some(self.flag_for(&id))
    }

    #[must_use]
    pub fn flag_for(&self, question_id: &QuestionId) -> bool {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(question_id)
            .copied()
            .unwrap_or(false)
    }

    /// Flip the favorite flag of the active question.
    ///
    /// Returns `Ok(None)` when nothing is active or the result went stale.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the remote call fails while its question is
    /// still active.
    pub async fn toggle(&self, api: &dyn FavoriteApi) -> Result<Option<bool>, RemoteError> {
        let Some(ticket) = self.active.dispatch() else {
            return Ok(None);
        };
        let question_id = ticket.target().clone();
        let desired = !self.flag_for(&question_id);

        let result = api.set_favorite(&question_id, desired).await;

        let applied = self.active.apply_if_active(&ticket, || match &result {
            Ok(favorite) => {
                self.known
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(question_id.clone(), *favorite);
                Ok(Some(*favorite))
            }
            Err(err) => Err(err.clone()),
        });

        match applied {
            Some(outcome) => outcome,
            None => {
                tracing::debug!(question_id = %question_id, "dropping stale favorite result");
                Ok(None)
            }
        }
    }
}
