use quiz_core::model::{OptionId, Question, SessionId, SessionProgress, SessionSnapshot};

/// What the UI renders for the question under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentEntryView {
    pub session_id: SessionId,
    pub question: Question,
    pub selected_option_ids: Vec<OptionId>,
    pub has_submitted: bool,
    pub progress: SessionProgress,
}

impl CurrentEntryView {
    /// View of the snapshot's current entry; `None` when it has no entries.
    #[must_use]
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Option<Self> {
        let entry = snapshot.current_entry()?;
        Some(Self {
            session_id: snapshot.session_id().clone(),
            question: entry.question.clone(),
            selected_option_ids: entry.selected_option_ids.clone(),
            has_submitted: entry.has_submitted,
            progress: snapshot.progress(),
        })
    }

    /// View for a question that could not be persisted locally.
    #[must_use]
    pub fn detached(session_id: SessionId, question: Question) -> Self {
        Self {
            session_id,
            question,
            selected_option_ids: Vec::new(),
            has_submitted: false,
            progress: SessionProgress {
                position: 1,
                total: 1,
                queued: 0,
                submitted: 0,
            },
        }
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.has_submitted && self.question.is_correct_selection(&self.selected_option_ids)
    }
}
