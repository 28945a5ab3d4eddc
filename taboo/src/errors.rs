/// The reason a description was rejected by a [`TabooSet`](crate::TabooSet).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabooViolation {
    /// The offending part of the description, as the player typed it.
    pub found: String,
    /// The answer or taboo word it matched, as it was configured.
    pub word: String,
    /// Whether `word` is the secret answer itself rather than a taboo word.
    pub is_answer: bool,
}

impl std::error::Error for TabooViolation {}

impl std::fmt::Display for TabooViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_answer {
            write!(f, "'{}' gives away the secret answer", self.found)
        } else {
            write!(f, "'{}' matches the taboo word '{}'", self.found, self.word)
        }
    }
}

/// The error type for building a [`TargetTable`](crate::TargetTable).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidTarget {
    EmptyAnswer,
    DuplicateAnswer { answer: String },
    EmptyTabooWord { answer: String, word_idx: usize },
}

impl std::error::Error for InvalidTarget {}

impl std::fmt::Display for InvalidTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidTarget::EmptyAnswer => write!(f, "A target has an empty answer"),
            InvalidTarget::DuplicateAnswer { answer } => {
                write!(f, "The answer '{}' is defined more than once", answer)
            }
            InvalidTarget::EmptyTabooWord { answer, word_idx } => write!(
                f,
                "Taboo word number {} of '{}' is empty after normalization",
                word_idx + 1,
                answer
            ),
        }
    }
}

/// Configured answers that the detector can never report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownTargets {
    pub answers: Vec<String>,
}

impl std::error::Error for UnknownTargets {}

impl std::fmt::Display for UnknownTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "These answers are not in the detector's label vocabulary and could never be guessed: {}",
            self.answers.join(", ")
        )
    }
}
