mod ids;
mod question;
mod session;
mod snapshot;

pub use ids::{OPTION_ALPHABET, OptionId, ParseIdError, QuestionId, SessionId};

pub use question::{Question, QuestionError, QuestionOption, QuestionType};
pub use session::{Difficulty, SessionRecord, SessionRecordError};
pub use snapshot::{
    Accuracy, CursorStep, QuestionEntry, SessionProgress, SessionSnapshot, SnapshotError,
};
