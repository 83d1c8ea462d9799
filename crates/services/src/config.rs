use std::env;

/// Connection settings for the remote quiz service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl QuizApiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. A blank base URL disables the API.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let base_url = lookup("QUIZ_API_BASE_URL")?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_token = lookup("QUIZ_API_TOKEN").filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url: base_url.trim().to_string(),
            api_token,
        })
    }
}

/// Look-ahead buffer sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Replenishment starts when fewer questions than this are buffered.
    pub min_queued_questions: usize,
    /// Hard cap on buffered questions; extra enqueues are dropped.
    pub max_queued_questions: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_queued_questions: 2,
            max_queued_questions: 3,
        }
    }
}

impl QueueConfig {
    /// Clamp so the cap is never below the watermark.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            min_queued_questions: self.min_queued_questions,
            max_queued_questions: self.max_queued_questions.max(self.min_queued_questions),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuizConfig {
    pub api: Option<QuizApiConfig>,
    pub queue: QueueConfig,
    /// Style hints rotated into generation requests.
    pub question_styles: Vec<String>,
}

impl QuizConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = QueueConfig::default();
        let parse_count = |key: &str, fallback: usize| {
            lookup(key)
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(fallback)
        };
        let queue = QueueConfig {
            min_queued_questions: parse_count("QUIZ_MIN_QUEUED", defaults.min_queued_questions),
            max_queued_questions: parse_count("QUIZ_MAX_QUEUED", defaults.max_queued_questions),
        }
        .normalized();

        let question_styles: Vec<String> = lookup("QUIZ_QUESTION_STYLES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|style| !style.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            api: QuizApiConfig::from_lookup(&lookup),
            queue,
            question_styles,
        }
    }
}
