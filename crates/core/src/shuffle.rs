//! Deterministic option shuffling.
//!
//! The same question shown twice in the same session keeps its option order,
//! while different sessions or questions get different orders. The seed is a
//! 32-bit FNV-1a hash of a caller-supplied key, expanded by a linear
//! congruential generator that drives a Fisher–Yates shuffle.

use crate::model::{OptionId, Question, QuestionId, QuestionOption, SessionId};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;

/// 32-bit FNV-1a hash over the UTF-8 bytes of `key`.
#[must_use]
pub fn fnv1a_32(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Recommended seed key: `"{session_id}:{question_id}"`.
#[must_use]
pub fn seed_key(session_id: &SessionId, question_id: &QuestionId) -> String {
    format!("{session_id}:{question_id}")
}

/// Linear congruential generator over `u32` state.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.state
    }

    /// Next value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform-ish index in `0..=max`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn next_index(&mut self, max: usize) -> usize {
        let scaled = (self.next_unit() * (max as f64 + 1.0)).floor() as usize;
        scaled.min(max)
    }
}

/// Fisher–Yates permutation of `0..len` seeded from `seed_key`.
///
/// `order[i]` is the original index placed at position `i`.
#[must_use]
pub fn permutation(len: usize, seed_key: &str) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    let mut rng = Lcg::new(fnv1a_32(seed_key));
    for i in (1..len).rev() {
        let j = rng.next_index(i);
        order.swap(i, j);
    }
    order
}

/// A question with its options reordered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShuffledQuestion {
    pub question: Question,
    /// Original option index at each displayed position.
    pub order: Vec<usize>,
    /// Displayed positions of the correct options, ascending.
    pub correct_option_indexes: Vec<usize>,
}

/// Shuffle the options of `question`, remapping the correct answers.
///
/// Pure: the same question and key always give the same output. Option texts
/// bound to the correct positions are the texts that were correct before.
/// Questions labelled `A`, `B`, ... keep that labelling by position.
#[must_use]
pub fn shuffle_question(question: &Question, seed_key: &str) -> ShuffledQuestion {
    let len = question.options().len();
    if len <= 1 {
        return unshuffled(question);
    }

    let order = permutation(len, seed_key);
    let relabel = question
        .options()
        .iter()
        .enumerate()
        .all(|(index, option)| OptionId::from_index(index).as_ref() == Some(&option.id));

    let options: Vec<QuestionOption> = order
        .iter()
        .enumerate()
        .map(|(position, &original)| {
            let source = &question.options()[original];
            let id = if relabel {
                OptionId::from_index(position).unwrap_or_else(|| source.id.clone())
            } else {
                source.id.clone()
            };
            QuestionOption {
                id,
                text: source.text.clone(),
            }
        })
        .collect();

    let mut shuffled_position = vec![None; len];
    for (position, &original) in order.iter().enumerate() {
        shuffled_position[original] = Some(position);
    }
    let mut correct_option_indexes: Vec<usize> = question
        .correct_option_indexes()
        .into_iter()
        .filter_map(|original| shuffled_position.get(original).copied().flatten())
        .collect();
    correct_option_indexes.sort_unstable();

    let correct_option_ids = correct_option_indexes
        .iter()
        .map(|&position| options[position].id.clone())
        .collect();

    match Question::from_parts(
        question.id().clone(),
        question.prompt(),
        question.question_type(),
        options,
        correct_option_ids,
        question.explanation().map(str::to_owned),
    ) {
        Ok(shuffled) => ShuffledQuestion {
            question: shuffled,
            order,
            correct_option_indexes,
        },
        Err(_) => unshuffled(question),
    }
}

fn unshuffled(question: &Question) -> ShuffledQuestion {
    ShuffledQuestion {
        question: question.clone(),
        order: (0..question.options().len()).collect(),
        correct_option_indexes: question.correct_option_indexes(),
    }
}
