use std::collections::HashMap;

use crate::model::Difficulty;

/// Round-robin cursors for question style hints, keyed by subject and difficulty.
///
/// Owned by whoever scopes the rotation (one per session in the client, one per
/// request context on a server) and passed into [`StyleRotation::next_style`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRotation {
    cursors: HashMap<(String, Difficulty), usize>,
}

impl StyleRotation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next style for `(subject, difficulty)` and advance its cursor.
    ///
    /// Returns `None` when `styles` is empty.
    pub fn next_style<'a, S: AsRef<str>>(
        &mut self,
        subject: &str,
        difficulty: Difficulty,
        styles: &'a [S],
    ) -> Option<&'a str> {
        if styles.is_empty() {
            return None;
        }
        let cursor = self
            .cursors
            .entry((subject.to_owned(), difficulty))
            .or_insert(0);
        let picked = styles[*cursor % styles.len()].as_ref();
        *cursor = (*cursor + 1) % styles.len();
        Some(picked)
    }

    pub fn reset(&mut self) {
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_per_subject_and_difficulty() {
        let styles = ["definition", "scenario", "calculation"];
        let mut rotation = StyleRotation::new();

        assert_eq!(rotation.next_style("math", Difficulty::Easy, &styles), Some("definition"));
        assert_eq!(rotation.next_style("math", Difficulty::Easy, &styles), Some("scenario"));
        assert_eq!(rotation.next_style("math", Difficulty::Hard, &styles), Some("definition"));
        assert_eq!(rotation.next_style("bio", Difficulty::Easy, &styles), Some("definition"));
        assert_eq!(rotation.next_style("math", Difficulty::Easy, &styles), Some("calculation"));
        assert_eq!(rotation.next_style("math", Difficulty::Easy, &styles), Some("definition"));
    }

    #[test]
    fn empty_styles_yield_none() {
        let mut rotation = StyleRotation::new();
        let styles: [&str; 0] = [];
        assert_eq!(rotation.next_style("math", Difficulty::Easy, &styles), None);
    }

    #[test]
    fn reset_restarts_rotation() {
        let styles = vec!["a".to_string(), "b".to_string()];
        let mut rotation = StyleRotation::new();
        let _ = rotation.next_style("math", Difficulty::Medium, &styles);
        rotation.reset();
        assert_eq!(rotation.next_style("math", Difficulty::Medium, &styles), Some("a"));
    }
}
