//! Storage-safe string encoding for [`SessionSnapshot`].
//!
//! Decoding is all-or-nothing: any structural violation rejects the whole
//! payload instead of returning a partially read snapshot.

use serde_json::{Map, Value};
use thiserror::Error;

use quiz_core::model::{
    OptionId, Question, QuestionEntry, SessionId, SessionSnapshot, SnapshotError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot field `{field}` is invalid: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("entry {index} is invalid: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

fn invalid(field: &'static str, reason: &'static str) -> CodecError {
    CodecError::InvalidField { field, reason }
}

/// Parse a stored snapshot; `None` for any malformed input.
#[must_use]
pub fn parse(raw: &str) -> Option<SessionSnapshot> {
    match decode(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            tracing::debug!(error = %err, "discarding unreadable session snapshot");
            None
        }
    }
}

/// Decode a stored snapshot, reporting why it was rejected.
///
/// # Errors
///
/// Returns `CodecError` for JSON failures, structural violations, or snapshot
/// invariants (cursor bounds, duplicate questions).
pub fn decode(raw: &str) -> Result<SessionSnapshot, CodecError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| invalid("snapshot", "expected an object"))?;

    let session_id = match object.get("sessionId") {
        Some(Value::String(id)) if !id.is_empty() => SessionId::new(id.clone()),
        _ => return Err(invalid("sessionId", "expected a non-empty string")),
    };

    let raw_entries = object
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("entries", "expected an array"))?;
    let entries = raw_entries
        .iter()
        .enumerate()
        .map(|(index, entry)| decode_entry(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let cursor_index = object
        .get("cursorIndex")
        .and_then(integer_index)
        .ok_or_else(|| invalid("cursorIndex", "expected a non-negative integer"))?;

    Ok(SessionSnapshot::from_parts(session_id, entries, cursor_index)?)
}

/// Encode a snapshot for storage. Inverse of [`decode`].
///
/// # Errors
///
/// Returns `CodecError::Json` if serialization fails.
pub fn serialize(snapshot: &SessionSnapshot) -> Result<String, CodecError> {
    Ok(serde_json::to_string(snapshot)?)
}

fn decode_entry(index: usize, value: &Value) -> Result<QuestionEntry, CodecError> {
    let entry_error = |reason: &str| CodecError::InvalidEntry {
        index,
        reason: reason.to_string(),
    };

    let object: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| entry_error("expected an object"))?;

    let question_value = object
        .get("question")
        .filter(|q| q.is_object())
        .ok_or_else(|| entry_error("`question` must be an object"))?;
    let question: Question =
        serde_json::from_value(question_value.clone()).map_err(|err| CodecError::InvalidEntry {
            index,
            reason: err.to_string(),
        })?;

    let selected = object
        .get("selectedOptionIds")
        .and_then(Value::as_array)
        .ok_or_else(|| entry_error("`selectedOptionIds` must be an array"))?;
    let selected_option_ids = selected
        .iter()
        .map(|id| match id {
            Value::String(label) if !label.is_empty() => Ok(OptionId::new(label.clone())),
            _ => Err(entry_error("`selectedOptionIds` must hold non-empty strings")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let has_submitted = object
        .get("hasSubmitted")
        .and_then(Value::as_bool)
        .ok_or_else(|| entry_error("`hasSubmitted` must be a boolean"))?;

    Ok(QuestionEntry {
        question,
        selected_option_ids,
        has_submitted,
    })
}

/// Accepts integral JSON numbers, including `2.0`; rejects fractions and negatives.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn integer_index(value: &Value) -> Option<usize> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(int) = number.as_u64() {
        return usize::try_from(int).ok();
    }
    let float = number.as_f64()?;
    if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= usize::MAX as f64 {
        return Some(float as usize);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionId, QuestionType};

    fn question(id: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            "Pick the even number",
            QuestionType::SingleChoice,
            vec!["1".into(), "2".into(), "3".into()],
            &[1],
        )
        .unwrap()
    }

    fn sample_snapshot() -> SessionSnapshot {
        let snapshot = SessionSnapshot::empty(SessionId::new("s1"))
            .upsert_current_question(question("q1"))
            .update_current_entry(|e| e.with_selection(vec![OptionId::new("B")]))
            .unwrap()
            .update_current_entry(QuestionEntry::submitted)
            .unwrap();
        snapshot
            .upsert_current_question(question("q2"))
            .enqueue(question("q3"), 2)
    }

    fn sample_json() -> Value {
        serde_json::from_str(&serialize(&sample_snapshot()).unwrap()).unwrap()
    }

    #[test]
    fn round_trip_is_lossless() {
        let snapshot = sample_snapshot();
        let raw = serialize(&snapshot).unwrap();
        assert_eq!(parse(&raw), Some(snapshot));

        let empty = SessionSnapshot::empty(SessionId::new("fresh"));
        assert_eq!(parse(&serialize(&empty).unwrap()), Some(empty));
    }

    #[test]
    fn serialized_shape_uses_camel_case_keys() {
        let json = sample_json();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["cursorIndex"], 1);
        assert_eq!(json["entries"][0]["hasSubmitted"], true);
        assert_eq!(json["entries"][0]["selectedOptionIds"][0], "B");
    }

    #[test]
    fn rejects_garbage_and_non_objects() {
        assert!(parse("not json").is_none());
        assert!(parse("[]").is_none());
        assert!(parse("null").is_none());
    }

    #[test]
    fn rejects_empty_session_id() {
        let mut json = sample_json();
        json["sessionId"] = Value::String(String::new());
        assert!(parse(&json.to_string()).is_none());
    }

    #[test]
    fn whitespace_session_id_round_trips() {
        let snapshot = SessionSnapshot::empty(SessionId::new(" "));
        let raw = serialize(&snapshot).unwrap();
        assert_eq!(parse(&raw), Some(snapshot));
    }

    #[test]
    fn rejects_out_of_range_cursor_instead_of_clamping() {
        let mut json = sample_json();
        json["cursorIndex"] = Value::from(3);
        let err = decode(&json.to_string()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Snapshot(SnapshotError::CursorOutOfBounds { cursor: 3, len: 3 })
        ));
    }

    #[test]
    fn rejects_fractional_or_negative_cursor() {
        let mut json = sample_json();
        json["cursorIndex"] = Value::from(1.5);
        assert!(parse(&json.to_string()).is_none());
        json["cursorIndex"] = Value::from(-1);
        assert!(parse(&json.to_string()).is_none());
        json["cursorIndex"] = Value::from(1.0);
        assert_eq!(parse(&json.to_string()).unwrap().cursor_index(), 1);
    }

    #[test]
    fn rejects_malformed_entries() {
        let mut json = sample_json();
        json["entries"][1]["selectedOptionIds"] = serde_json::json!([""]);
        assert!(parse(&json.to_string()).is_none());

        let mut json = sample_json();
        json["entries"][0]["hasSubmitted"] = Value::from("yes");
        assert!(parse(&json.to_string()).is_none());

        let mut json = sample_json();
        json["entries"][2]["question"] = Value::from("q3");
        assert!(parse(&json.to_string()).is_none());
    }

    #[test]
    fn rejects_duplicate_questions() {
        let mut json = sample_json();
        let first = json["entries"][0].clone();
        json["entries"][1] = first;
        assert!(parse(&json.to_string()).is_none());
    }
}
