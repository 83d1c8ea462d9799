use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId, SessionId};
use crate::model::question::Question;

//
// ─── ENTRY ─────────────────────────────────────────────────────────────────────
//

/// One question plus the learner's selection/submission state for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntry {
    pub question: Question,
    pub selected_option_ids: Vec<OptionId>,
    pub has_submitted: bool,
}

impl QuestionEntry {
    #[must_use]
    pub fn new(question: Question) -> Self {
        Self {
            question,
            selected_option_ids: Vec::new(),
            has_submitted: false,
        }
    }

    /// True when the entry was submitted with exactly the correct selection.
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.has_submitted && self.question.is_correct_selection(&self.selected_option_ids)
    }

    #[must_use]
    pub fn with_selection(&self, selected: Vec<OptionId>) -> Self {
        Self {
            selected_option_ids: selected,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn submitted(&self) -> Self {
        Self {
            has_submitted: true,
            ..self.clone()
        }
    }
}

//
// ─── DERIVED VIEWS ─────────────────────────────────────────────────────────────
//

/// Aggregate accuracy over submitted entries. Derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accuracy {
    pub submitted_count: u32,
    pub correct_count: u32,
}

impl Accuracy {
    /// Correct share in percent, rounded down. `None` before the first submission.
    #[must_use]
    pub fn percent(&self) -> Option<u32> {
        if self.submitted_count == 0 {
            return None;
        }
        let percent = u64::from(self.correct_count) * 100 / u64::from(self.submitted_count);
        u32::try_from(percent).ok()
    }
}

/// Aggregated view of where the learner is inside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// 1-based position of the cursor; 0 when the snapshot has no entries.
    pub position: usize,
    pub total: usize,
    pub queued: usize,
    pub submitted: usize,
}

/// Direction for cursor navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStep {
    Back,
    Forward,
}

impl CursorStep {
    #[must_use]
    pub fn offset(self) -> isize {
        match self {
            CursorStep::Back => -1,
            CursorStep::Forward => 1,
        }
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("session id cannot be empty")]
    BlankSessionId,

    #[error("cursor index {cursor} is out of bounds for {len} entries")]
    CursorOutOfBounds { cursor: usize, len: usize },

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

/// The locally persisted state of one question session: history plus cursor.
///
/// Invariants: `cursor_index <= max(0, entries.len() - 1)`, and no two entries
/// share a question id. All transformations return a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    session_id: SessionId,
    entries: Vec<QuestionEntry>,
    cursor_index: usize,
}

impl SessionSnapshot {
    /// Empty snapshot for a freshly started session.
    #[must_use]
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            entries: Vec::new(),
            cursor_index: 0,
        }
    }

    /// Rehydrate a snapshot, checking every invariant.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` when the session id is empty, the cursor is out of
    /// bounds, or a question id repeats.
    pub fn from_parts(
        session_id: SessionId,
        entries: Vec<QuestionEntry>,
        cursor_index: usize,
    ) -> Result<Self, SnapshotError> {
        if session_id.as_str().is_empty() {
            return Err(SnapshotError::BlankSessionId);
        }
        if cursor_index > max_cursor(entries.len()) {
            return Err(SnapshotError::CursorOutOfBounds {
                cursor: cursor_index,
                len: entries.len(),
            });
        }
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert(entry.question.id()) {
                return Err(SnapshotError::DuplicateQuestion(entry.question.id().clone()));
            }
        }

        Ok(Self {
            session_id,
            entries,
            cursor_index,
        })
    }

    /// Keep `existing` when it belongs to `session_id`; otherwise start fresh.
    #[must_use]
    pub fn initialize(existing: Option<SessionSnapshot>, session_id: &SessionId) -> Self {
        match existing {
            Some(snapshot) if &snapshot.session_id == session_id => snapshot,
            _ => Self::empty(session_id.clone()),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn entries(&self) -> &[QuestionEntry] {
        &self.entries
    }

    #[must_use]
    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    #[must_use]
    pub fn belongs_to(&self, session_id: &SessionId) -> bool {
        &self.session_id == session_id
    }

    #[must_use]
    pub fn current_entry(&self) -> Option<&QuestionEntry> {
        self.entries.get(self.cursor_index)
    }

    /// Number of entries strictly after the cursor.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries.len() - 1 - self.cursor_index
    }

    #[must_use]
    pub fn contains_question(&self, id: &QuestionId) -> bool {
        self.position_of(id).is_some()
    }

    fn position_of(&self, id: &QuestionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.question.id() == id)
    }

    /// Make `question` the current entry.
    ///
    /// A submitted current entry means the learner moved past it, so the question
    /// is appended and becomes current. Otherwise a known question id moves the
    /// cursor there and refreshes its payload, and an unknown one is appended.
    #[must_use]
    pub fn upsert_current_question(mut self, question: Question) -> Self {
        let current_submitted = self
            .current_entry()
            .is_some_and(|entry| entry.has_submitted);

        if !current_submitted {
            if let Some(index) = self.position_of(question.id()) {
                self.entries[index].question = question;
                self.cursor_index = index;
                return self;
            }
        } else if let Some(index) = self.position_of(question.id()) {
            // Already in history; appending would break id uniqueness.
            self.cursor_index = index;
            return self;
        }

        self.entries.push(QuestionEntry::new(question));
        self.cursor_index = self.entries.len() - 1;
        self
    }

    /// Move the cursor one step; `None` when that would leave the entries.
    #[must_use]
    pub fn shift_cursor(&self, step: CursorStep) -> Option<Self> {
        let target = self.cursor_index.checked_add_signed(step.offset())?;
        if target >= self.entries.len() {
            return None;
        }
        Some(Self {
            cursor_index: target,
            ..self.clone()
        })
    }

    /// Apply `update` to the current entry only; `None` when there is none.
    #[must_use]
    pub fn update_current_entry<F>(&self, update: F) -> Option<Self>
    where
        F: FnOnce(&QuestionEntry) -> QuestionEntry,
    {
        let current = self.current_entry()?;
        let updated = update(current);
        let mut next = self.clone();
        next.entries[self.cursor_index] = updated;
        Some(next)
    }

    /// Append a look-ahead question.
    ///
    /// Duplicates and overflow past `max_queued` are dropped silently.
    #[must_use]
    pub fn enqueue(mut self, question: Question, max_queued: usize) -> Self {
        if self.contains_question(question.id()) || self.queued_count() >= max_queued {
            return self;
        }
        self.entries.push(QuestionEntry::new(question));
        self
    }

    /// Discard every look-ahead entry after the cursor.
    #[must_use]
    pub fn drop_queued(mut self) -> Self {
        self.entries.truncate(self.cursor_index + 1);
        self
    }

    /// Promote the next buffered question to current.
    #[must_use]
    pub fn consume_queued(&self) -> Option<Self> {
        self.shift_cursor(CursorStep::Forward)
    }

    #[must_use]
    pub fn accuracy(&self) -> Accuracy {
        self.entries
            .iter()
            .filter(|entry| entry.has_submitted)
            .fold(Accuracy::default(), |acc, entry| Accuracy {
                submitted_count: acc.submitted_count.saturating_add(1),
                correct_count: if entry.is_correct() {
                    acc.correct_count.saturating_add(1)
                } else {
                    acc.correct_count
                },
            })
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            position: if self.entries.is_empty() {
                0
            } else {
                self.cursor_index + 1
            },
            total: self.entries.len(),
            queued: self.queued_count(),
            submitted: self.entries.iter().filter(|e| e.has_submitted).count(),
        }
    }
}

fn max_cursor(len: usize) -> usize {
    len.saturating_sub(1)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
