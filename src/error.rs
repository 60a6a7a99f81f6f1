use thiserror::Error;

use crate::activity::ActivityType;
use crate::identity::{EntityKey, PathKey};

/// Rejections raised by the domain model. A method that returns one of these
/// has left its receiver untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("difficulty level must be between 1 and 5, got {0}")]
    InvalidDifficulty(i32),
    #[error("expected duration must be positive")]
    InvalidDuration,
    #[error("passing score must be between 0 and 100, got {0}")]
    InvalidPassingScore(f64),
    #[error("a quiz needs at least one question")]
    EmptyQuiz,
    #[error("correct option {0} is out of range (4 options)")]
    InvalidOption(usize),
    #[error("question '{0}' appears more than once")]
    DuplicateQuestion(String),
    #[error("rating must be between 0.0 and 5.0, got {0}")]
    RatingOutOfRange(f64),
    #[error("feedback is blank")]
    BlankFeedback,
    #[error("{0} already exists")]
    Conflict(EntityKey),
    #[error("{0} not found")]
    NotFound(EntityKey),
    #[error("{expected} activity cannot take a {got} submission")]
    SubmissionMismatch {
        expected: ActivityType,
        got: &'static str,
    },
    #[error("expected {expected} answers, got {got}")]
    AnswerCount { expected: usize, got: usize },
    #[error("progress belongs to '{expected}', not '{got}'")]
    PathMismatch { expected: PathKey, got: PathKey },
}
