use std::sync::Arc;

use quiz_core::model::{SessionRecord, SessionSnapshot};

use super::local::LocalSessionService;
use crate::error::RemoteError;
use crate::remote::SessionApi;

/// A local snapshot confirmed by the remote session of record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Authoritative difficulty and counters.
    pub record: SessionRecord,
    /// Per-question UI state (selection, cursor).
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Active(ActiveSession),
    NoActiveSession,
}

/// Checks the local snapshot against the remote session and drops it when
/// the remote no longer knows it.
pub struct SessionReconciler {
    local: Arc<LocalSessionService>,
    sessions: Arc<dyn SessionApi>,
}

impl SessionReconciler {
    #[must_use]
    pub fn new(local: Arc<LocalSessionService>, sessions: Arc<dyn SessionApi>) -> Self {
        Self { local, sessions }
    }

    /// Resolve whether there is a session to resume.
    ///
    /// Without a local snapshot no remote call is made.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the session lookup fails; local state is kept
    /// so a later attempt can still resume.
    pub async fn reconcile(&self) -> Result<Reconciliation, RemoteError> {
        let Some(snapshot) = self.local.read_snapshot().await else {
            self.local.clear_session().await;
            return Ok(Reconciliation::NoActiveSession);
        };

        let session_id = snapshot.session_id().clone();
        match self.sessions.fetch_session(&session_id).await? {
            Some(record) if record.id() == &session_id => {
                tracing::debug!(session_id = %session_id, "local session confirmed");
                Ok(Reconciliation::Active(ActiveSession { record, snapshot }))
            }
            Some(record) => {
                tracing::info!(local = %session_id, remote = %record.id(), "session superseded; dropping local state");
                self.local.clear_session().await;
                Ok(Reconciliation::NoActiveSession)
            }
            None => {
                tracing::info!(session_id = %session_id, "session gone remotely; dropping local state");
                self.local.clear_session().await;
                Ok(Reconciliation::NoActiveSession)
            }
        }
    }
}
