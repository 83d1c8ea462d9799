use std::sync::Arc;

use quiz_core::model::{
    Accuracy, CursorStep, OptionId, Question, QuestionType, SessionId, SessionProgress,
    SessionSnapshot,
};
use storage::SnapshotStore;
use storage::codec;
use tokio::sync::Mutex;

use super::view::CurrentEntryView;

/// Stateful facade over the snapshot model, the codec, and a snapshot store.
///
/// Every operation is failure tolerant: storage errors are logged and treated
/// as "nothing stored", and precondition failures come back as `None` so
/// callers can fall back to a network fetch.
pub struct LocalSessionService {
    store: Arc<dyn SnapshotStore>,
    max_queued: usize,
    // Serializes read-modify-write cycles on the single slot.
    write_lock: Mutex<()>,
}

impl LocalSessionService {
    #[must_use]
    pub fn new(store: Arc<dyn SnapshotStore>, max_queued: usize) -> Self {
        Self {
            store,
            max_queued,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn max_queued(&self) -> usize {
        self.max_queued
    }

    /// Stored snapshot, `None` when missing, unreadable, or invalid.
    pub async fn read_snapshot(&self) -> Option<SessionSnapshot> {
        let raw = match self.store.read_raw().await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session snapshot");
                return None;
            }
        };
        codec::parse(&raw)
    }

    /// Stored snapshot, only if it belongs to `session_id`.
    pub async fn read_snapshot_for_session(&self, session_id: &SessionId) -> Option<SessionSnapshot> {
        self.read_snapshot()
            .await
            .filter(|snapshot| snapshot.belongs_to(session_id))
    }

    /// Resume the stored snapshot for `session_id` or replace it with a fresh one.
    pub async fn write_session(&self, session_id: &SessionId) -> SessionSnapshot {
        let _guard = self.write_lock.lock().await;
        let existing = self.read_snapshot().await;
        let snapshot = SessionSnapshot::initialize(existing, session_id);
        self.persist(&snapshot).await;
        snapshot
    }

    /// Make `question` current in the stored snapshot.
    ///
    /// `None` when no snapshot exists yet; call [`Self::write_session`] first.
    pub async fn write_question(&self, question: Question) -> Option<CurrentEntryView> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot().await?.upsert_current_question(question);
        self.persist(&snapshot).await;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    /// Make `question` current after discarding any buffered look-ahead, so
    /// nothing is left unanswered between the cursor and the new entry.
    pub async fn write_question_over_queue(&self, question: Question) -> Option<CurrentEntryView> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self
            .read_snapshot()
            .await?
            .drop_queued()
            .upsert_current_question(question);
        self.persist(&snapshot).await;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    pub async fn shift_question(
        &self,
        session_id: &SessionId,
        step: CursorStep,
    ) -> Option<CurrentEntryView> {
        let snapshot = self
            .mutate(session_id, |snapshot| snapshot.shift_cursor(step))
            .await?;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    /// Replace the selection of the current entry.
    ///
    /// Unknown ids and repeats are dropped; single-answer questions keep only
    /// the last pick. `None` once the entry has been submitted.
    pub async fn write_selection(
        &self,
        session_id: &SessionId,
        selected: Vec<OptionId>,
    ) -> Option<CurrentEntryView> {
        let snapshot = self
            .mutate(session_id, |snapshot| {
                let current = snapshot.current_entry()?;
                if current.has_submitted {
                    return None;
                }
                let selection = sanitize_selection(&current.question, selected);
                snapshot.update_current_entry(|entry| entry.with_selection(selection))
            })
            .await?;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    /// Flag the current entry as submitted. Idempotent for a submitted entry.
    pub async fn mark_submitted(&self, session_id: &SessionId) -> Option<CurrentEntryView> {
        let snapshot = self
            .mutate(session_id, |snapshot| {
                snapshot.update_current_entry(|entry| entry.submitted())
            })
            .await?;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    /// Buffer a look-ahead question; duplicates and overflow are dropped.
    pub async fn enqueue_question(
        &self,
        session_id: &SessionId,
        question: Question,
    ) -> Option<SessionProgress> {
        let max_queued = self.max_queued;
        let snapshot = self
            .mutate(session_id, |snapshot| {
                let before = snapshot.entries().len();
                let next = snapshot.clone().enqueue(question, max_queued);
                if next.entries().len() == before {
                    tracing::debug!(session_id = %snapshot.session_id(), "look-ahead question dropped");
                }
                Some(next)
            })
            .await?;
        Some(snapshot.progress())
    }

    /// Promote the next buffered question; `None` when the buffer is empty.
    pub async fn consume_queued_question(&self, session_id: &SessionId) -> Option<CurrentEntryView> {
        let snapshot = self
            .mutate(session_id, SessionSnapshot::consume_queued)
            .await?;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    pub async fn read_current(&self, session_id: &SessionId) -> Option<CurrentEntryView> {
        let snapshot = self.read_snapshot_for_session(session_id).await?;
        CurrentEntryView::from_snapshot(&snapshot)
    }

    pub async fn read_accuracy(&self, session_id: &SessionId) -> Option<Accuracy> {
        let snapshot = self.read_snapshot_for_session(session_id).await?;
        Some(snapshot.accuracy())
    }

    pub async fn read_progress(&self, session_id: &SessionId) -> Option<SessionProgress> {
        let snapshot = self.read_snapshot_for_session(session_id).await?;
        Some(snapshot.progress())
    }

    /// Wipe the stored snapshot regardless of which session it belongs to.
    pub async fn clear_session(&self) {
        let _guard = self.write_lock.lock().await;
        if let Err(err) = self.store.clear_raw().await {
            tracing::warn!(error = %err, "failed to clear session snapshot");
        }
    }

    async fn mutate<F>(&self, session_id: &SessionId, update: F) -> Option<SessionSnapshot>
    where
        F: FnOnce(&SessionSnapshot) -> Option<SessionSnapshot>,
    {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.read_snapshot_for_session(session_id).await?;
        let updated = update(&snapshot)?;
        if updated != snapshot {
            self.persist(&updated).await;
        }
        Some(updated)
    }

    async fn persist(&self, snapshot: &SessionSnapshot) {
        // The codec rejects an empty id, so such a slot could never be read back.
        if snapshot.session_id().as_str().is_empty() {
            tracing::warn!("refusing to persist a snapshot without a session id");
            return;
        }
        let raw = match codec::serialize(snapshot) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(session_id = %snapshot.session_id(), error = %err, "failed to encode session snapshot");
                return;
            }
        };
        if let Err(err) = self.store.write_raw(&raw).await {
            tracing::warn!(session_id = %snapshot.session_id(), error = %err, "failed to persist session snapshot");
        }
    }
}

fn sanitize_selection(question: &Question, selected: Vec<OptionId>) -> Vec<OptionId> {
    let mut kept: Vec<OptionId> = Vec::with_capacity(selected.len());
    for id in selected {
        if question.option_text(&id).is_some() && !kept.contains(&id) {
            kept.push(id);
        }
    }
    match question.question_type() {
        QuestionType::MultipleChoice => kept,
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            kept.pop().into_iter().collect()
        }
    }
}
