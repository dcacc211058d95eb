//! Persistence seams for quizzes and attempts.
//!
//! Attempt writes are compare-and-swap on `(id, status, revision)`; a `false`
//! from [`AttemptRepository::update_if`] means someone else moved the attempt
//! first and the caller must reload.

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::models::{Attempt, AttemptStatus, Quiz};

pub mod memory;
pub mod mongo;

pub use memory::{InMemoryAttemptRepository, InMemoryQuizRepository};
pub use mongo::{MongoAttemptRepository, MongoQuizRepository};

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn find_by_id(&self, quiz_id: &str) -> EngineResult<Option<Quiz>>;

    async fn find_by_lesson(&self, lesson_id: &str) -> EngineResult<Option<Quiz>>;

    /// Fails with `Conflict` when the id or lesson is already taken.
    async fn insert(&self, quiz: &Quiz) -> EngineResult<()>;

    /// Fails with `QuizNotFound` when there is nothing to replace.
    async fn replace(&self, quiz: &Quiz) -> EngineResult<()>;

    /// Returns whether a quiz was removed.
    async fn delete(&self, quiz_id: &str) -> EngineResult<bool>;

    async fn ping(&self) -> EngineResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Attempt),
    /// The pair already had a live attempt; that one is returned untouched.
    Existing(Attempt),
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Inserts a new `in_progress` attempt, honouring the one-live-attempt
    /// rule per (quiz, learner).
    async fn insert_attempt(&self, attempt: &Attempt) -> EngineResult<InsertOutcome>;

    async fn find_attempt(&self, attempt_id: &str) -> EngineResult<Option<Attempt>>;

    /// All attempts of one learner on one quiz, newest first.
    async fn list_for_learner(&self, quiz_id: &str, learner_id: &str)
        -> EngineResult<Vec<Attempt>>;

    /// Writes `attempt` only if the stored copy still has `expected_status`
    /// and `expected_revision`.
    async fn update_if(
        &self,
        attempt: &Attempt,
        expected_status: AttemptStatus,
        expected_revision: i64,
    ) -> EngineResult<bool>;

    async fn delete_for_quiz(&self, quiz_id: &str) -> EngineResult<u64>;

    async fn ping(&self) -> EngineResult<()>;
}

pub(crate) fn newest_first(attempts: &mut [Attempt]) {
    attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
}
