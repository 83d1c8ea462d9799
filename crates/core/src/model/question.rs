use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub text: String,
}

/// A generated question. Immutable once received.
///
/// Option ids are assigned from the alphabet in display order and
/// `correct_option_ids` is always a duplicate-free subset of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuestionRecord")]
pub struct Question {
    id: QuestionId,
    prompt: String,
    question_type: QuestionType,
    options: Vec<QuestionOption>,
    correct_option_ids: Vec<OptionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt cannot be empty")]
    BlankPrompt,

    #[error("too many options for a single question: {len}")]
    TooManyOptions { len: usize },

    #[error("option ids cannot be empty")]
    BlankOptionId,

    #[error("duplicate option id: {0}")]
    DuplicateOption(OptionId),

    #[error("correct option {0} is not one of the question options")]
    UnknownCorrectOption(OptionId),

    #[error("correct option {0} listed more than once")]
    DuplicateCorrectOption(OptionId),

    #[error("correct option index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },
}

impl Question {
    /// Build a question from option texts, labelling options `A`, `B`, ... in order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the prompt is blank, there are more options than
    /// alphabet letters, or a correct index does not point at an option.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        question_type: QuestionType,
        option_texts: Vec<String>,
        correct_indexes: &[usize],
    ) -> Result<Self, QuestionError> {
        let options = label_options(option_texts)?;
        let len = options.len();
        let correct_option_ids = correct_indexes
            .iter()
            .map(|&index| {
                options
                    .get(index)
                    .map(|option| option.id.clone())
                    .ok_or(QuestionError::CorrectIndexOutOfRange { index, len })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_parts(id, prompt, question_type, options, correct_option_ids, None)
    }

    /// Rehydrate a question from already-labelled parts.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if any invariant of the question shape is violated.
    pub fn from_parts(
        id: QuestionId,
        prompt: impl Into<String>,
        question_type: QuestionType,
        options: Vec<QuestionOption>,
        correct_option_ids: Vec<OptionId>,
        explanation: Option<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::BlankPrompt);
        }

        let mut option_ids = HashSet::with_capacity(options.len());
        for option in &options {
            if option.id.as_str().is_empty() {
                return Err(QuestionError::BlankOptionId);
            }
            if !option_ids.insert(&option.id) {
                return Err(QuestionError::DuplicateOption(option.id.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(correct_option_ids.len());
        for correct in &correct_option_ids {
            if !option_ids.contains(correct) {
                return Err(QuestionError::UnknownCorrectOption(correct.clone()));
            }
            if !seen.insert(correct) {
                return Err(QuestionError::DuplicateCorrectOption(correct.clone()));
            }
        }

        Ok(Self {
            id,
            prompt,
            question_type,
            options,
            correct_option_ids,
            explanation,
        })
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        self.explanation = (!explanation.trim().is_empty()).then_some(explanation);
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }

    #[must_use]
    pub fn options(&self) -> &[QuestionOption] {
        &self.options
    }

    #[must_use]
    pub fn correct_option_ids(&self) -> &[OptionId] {
        &self.correct_option_ids
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Positions of the correct options, ascending.
    #[must_use]
    pub fn correct_option_indexes(&self) -> Vec<usize> {
        let mut indexes: Vec<usize> = self
            .correct_option_ids
            .iter()
            .filter_map(|id| self.options.iter().position(|option| &option.id == id))
            .collect();
        indexes.sort_unstable();
        indexes
    }

    #[must_use]
    pub fn option_text(&self, id: &OptionId) -> Option<&str> {
        self.options
            .iter()
            .find(|option| &option.id == id)
            .map(|option| option.text.as_str())
    }

    /// True when `selected` is exactly the set of correct options.
    ///
    /// A selection containing duplicates never counts as correct.
    #[must_use]
    pub fn is_correct_selection(&self, selected: &[OptionId]) -> bool {
        if selected.len() != self.correct_option_ids.len() {
            return false;
        }
        let unique: HashSet<&OptionId> = selected.iter().collect();
        unique.len() == selected.len()
            && self
                .correct_option_ids
                .iter()
                .all(|correct| unique.contains(correct))
    }
}

fn label_options(texts: Vec<String>) -> Result<Vec<QuestionOption>, QuestionError> {
    let len = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            OptionId::from_index(index)
                .map(|id| QuestionOption { id, text })
                .ok_or(QuestionError::TooManyOptions { len })
        })
        .collect()
}

/// Serialized shape of a question; validated into `Question` on the way in.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionRecord {
    id: QuestionId,
    prompt: String,
    question_type: QuestionType,
    options: Vec<QuestionOption>,
    correct_option_ids: Vec<OptionId>,
    #[serde(default)]
    explanation: Option<String>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        Self::from_parts(
            record.id,
            record.prompt,
            record.question_type,
            record.options,
            record.correct_option_ids,
            record.explanation,
        )
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
