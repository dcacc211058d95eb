//! Engine error taxonomy.
//!
//! Every engine operation returns [`QuizError`]; the handler layer maps each
//! variant onto an HTTP status without string matching.

use thiserror::Error;

use crate::models::attempt::AttemptStatus;

pub type EngineResult<T> = Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    /// Malformed quiz/question definition or answer payload.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("quiz not found: {0}")]
    QuizNotFound(String),

    #[error("question not found: {0}")]
    QuestionNotFound(String),

    #[error("attempt not found: {0}")]
    AttemptNotFound(String),

    /// Access-control denial (not enrolled, not the attempt owner).
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("maximum attempts reached ({max_attempts})")]
    AttemptLimitExceeded { max_attempts: i32 },

    #[error("quiz already passed")]
    AlreadyPassed,

    #[error("quiz is not attemptable: {0}")]
    QuizNotAttemptable(String),

    #[error("attempt {id} is not in progress (status: {status})")]
    AttemptNotInProgress { id: String, status: AttemptStatus },

    #[error("attempt {0} has not been graded yet")]
    NotGraded(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator (lock backend, enrollment service) could not answer.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl QuizError {
    pub fn validation(message: impl Into<String>) -> Self {
        QuizError::Validation(message.into())
    }

    /// Stable machine-readable code used in API error bodies and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            QuizError::Validation(_) => "validation_error",
            QuizError::QuizNotFound(_) => "quiz_not_found",
            QuizError::QuestionNotFound(_) => "question_not_found",
            QuizError::AttemptNotFound(_) => "attempt_not_found",
            QuizError::Forbidden(_) => "forbidden",
            QuizError::AttemptLimitExceeded { .. } => "attempt_limit_exceeded",
            QuizError::AlreadyPassed => "already_passed",
            QuizError::QuizNotAttemptable(_) => "quiz_not_attemptable",
            QuizError::AttemptNotInProgress { .. } => "attempt_not_in_progress",
            QuizError::NotGraded(_) => "not_graded",
            QuizError::Conflict(_) => "conflict",
            QuizError::Unavailable(_) => "unavailable",
            QuizError::Storage(_) => "storage_error",
        }
    }
}

impl From<mongodb::error::Error> for QuizError {
    fn from(err: mongodb::error::Error) -> Self {
        QuizError::Storage(anyhow::Error::new(err))
    }
}

impl From<validator::ValidationErrors> for QuizError {
    fn from(err: validator::ValidationErrors) -> Self {
        QuizError::Validation(err.to_string())
    }
}
