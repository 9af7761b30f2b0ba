use thiserror::Error;

/// A result shape that the store would reject.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("expected {expected} questionnaire answers, got {found}")]
    AnswerCount { expected: usize, found: usize },

    #[error("answer {index} is {value}, must be between 1 and 4")]
    AnswerOutOfRange { index: usize, value: u8 },

    #[error("total score {found} does not match the answers (expected {expected})")]
    TotalMismatch { expected: u32, found: u32 },

    #[error("{field} is {value}, must be at most {max}")]
    ScoreOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("average reaction time must be a finite non-negative number, got {0}")]
    InvalidAverage(f64),

    #[error("{field} is {value} but only {total_trials} trials were run")]
    CountExceedsTrials {
        field: &'static str,
        value: u32,
        total_trials: u32,
    },

    #[error(
        "total correct {total} does not equal congruent {congruent} + incongruent {incongruent}"
    )]
    BreakdownMismatch {
        total: u32,
        congruent: u32,
        incongruent: u32,
    },

    #[error("unknown task `{0}`")]
    UnknownTask(String),
}
