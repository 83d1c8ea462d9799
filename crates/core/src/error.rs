use thiserror::Error;

use crate::model::{QuestionError, SessionRecordError, SnapshotError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    SessionRecord(#[from] SessionRecordError),
}
