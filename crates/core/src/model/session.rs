use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::SessionId;

/// Difficulty tier of generated questions. The remote session may raise it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionRecordError {
    #[error("correct answers ({correct}) exceed submitted answers ({submitted})")]
    CountMismatch { submitted: u32, correct: u32 },
}

/// Authoritative session record held by the remote session service.
///
/// Owns difficulty and the submitted/correct counters; per-question UI state
/// stays in the local snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SessionRecordWire")]
pub struct SessionRecord {
    id: SessionId,
    difficulty: Difficulty,
    submitted_count: u32,
    correct_count: u32,
    subject_id: String,
    subcategory_id: String,
}

impl SessionRecord {
    /// Rehydrate a session record, checking that counters are consistent.
    ///
    /// # Errors
    ///
    /// Returns `SessionRecordError::CountMismatch` if `correct_count > submitted_count`.
    pub fn new(
        id: SessionId,
        difficulty: Difficulty,
        submitted_count: u32,
        correct_count: u32,
        subject_id: impl Into<String>,
        subcategory_id: impl Into<String>,
    ) -> Result<Self, SessionRecordError> {
        if correct_count > submitted_count {
            return Err(SessionRecordError::CountMismatch {
                submitted: submitted_count,
                correct: correct_count,
            });
        }
        Ok(Self {
            id,
            difficulty,
            submitted_count,
            correct_count,
            subject_id: subject_id.into(),
            subcategory_id: subcategory_id.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn submitted_count(&self) -> u32 {
        self.submitted_count
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    #[must_use]
    pub fn subcategory_id(&self) -> &str {
        &self.subcategory_id
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecordWire {
    id: SessionId,
    difficulty: Difficulty,
    submitted_count: u32,
    correct_count: u32,
    subject_id: String,
    subcategory_id: String,
}

impl TryFrom<SessionRecordWire> for SessionRecord {
    type Error = SessionRecordError;

    fn try_from(wire: SessionRecordWire) -> Result<Self, Self::Error> {
        Self::new(
            wire.id,
            wire.difficulty,
            wire.submitted_count,
            wire.correct_count,
            wire.subject_id,
            wire.subcategory_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_more_correct_than_submitted() {
        let err = SessionRecord::new(SessionId::new("s1"), Difficulty::Easy, 2, 3, "math", "algebra")
            .unwrap_err();
        assert_eq!(
            err,
            SessionRecordError::CountMismatch {
                submitted: 2,
                correct: 3
            }
        );
    }

    #[test]
    fn deserializes_camel_case_payload() {
        let json = r#"{
            "id": "s1",
            "difficulty": "medium",
            "submittedCount": 4,
            "correctCount": 3,
            "subjectId": "math",
            "subcategoryId": "algebra"
        }"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id(), &SessionId::new("s1"));
        assert_eq!(record.difficulty(), Difficulty::Medium);
        assert_eq!(record.submitted_count(), 4);
        assert_eq!(record.correct_count(), 3);
    }

    #[test]
    fn difficulty_orders_by_tier() {
        assert!(Difficulty::Easy < Difficulty::Medium);
        assert!(Difficulty::Medium < Difficulty::Hard);
        assert_eq!(Difficulty::Hard.to_string(), "hard");
    }
}
