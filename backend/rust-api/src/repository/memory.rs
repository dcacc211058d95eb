//! In-process repositories for tests and single-node development.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{newest_first, AttemptRepository, InsertOutcome, QuizRepository};
use crate::error::{EngineResult, QuizError};
use crate::models::{Attempt, AttemptStatus, Quiz};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct InMemoryQuizRepository {
    quizzes: Mutex<HashMap<String, Quiz>>,
}

impl InMemoryQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn find_by_id(&self, quiz_id: &str) -> EngineResult<Option<Quiz>> {
        Ok(lock(&self.quizzes).get(quiz_id).cloned())
    }

    async fn find_by_lesson(&self, lesson_id: &str) -> EngineResult<Option<Quiz>> {
        Ok(lock(&self.quizzes)
            .values()
            .find(|q| q.lesson_id == lesson_id)
            .cloned())
    }

    async fn insert(&self, quiz: &Quiz) -> EngineResult<()> {
        let mut quizzes = lock(&self.quizzes);
        if quizzes.contains_key(&quiz.id) || quizzes.values().any(|q| q.lesson_id == quiz.lesson_id)
        {
            return Err(QuizError::Conflict(format!(
                "lesson {} already has a quiz",
                quiz.lesson_id
            )));
        }
        quizzes.insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn replace(&self, quiz: &Quiz) -> EngineResult<()> {
        match lock(&self.quizzes).get_mut(&quiz.id) {
            Some(stored) => {
                *stored = quiz.clone();
                Ok(())
            }
            None => Err(QuizError::QuizNotFound(quiz.id.clone())),
        }
    }

    async fn delete(&self, quiz_id: &str) -> EngineResult<bool> {
        Ok(lock(&self.quizzes).remove(quiz_id).is_some())
    }

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAttemptRepository {
    attempts: Mutex<HashMap<String, Attempt>>,
}

impl InMemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn insert_attempt(&self, attempt: &Attempt) -> EngineResult<InsertOutcome> {
        let mut attempts = lock(&self.attempts);
        let live = attempts.values().find(|a| {
            a.quiz_id == attempt.quiz_id
                && a.learner_id == attempt.learner_id
                && a.status == AttemptStatus::InProgress
        });
        if let Some(existing) = live {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        if attempts.contains_key(&attempt.id) {
            return Err(QuizError::Conflict(format!(
                "attempt {} already exists",
                attempt.id
            )));
        }
        attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(InsertOutcome::Created(attempt.clone()))
    }

    async fn find_attempt(&self, attempt_id: &str) -> EngineResult<Option<Attempt>> {
        Ok(lock(&self.attempts).get(attempt_id).cloned())
    }

    async fn list_for_learner(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<Vec<Attempt>> {
        let mut attempts: Vec<Attempt> = lock(&self.attempts)
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.learner_id == learner_id)
            .cloned()
            .collect();
        newest_first(&mut attempts);
        Ok(attempts)
    }

    async fn update_if(
        &self,
        attempt: &Attempt,
        expected_status: AttemptStatus,
        expected_revision: i64,
    ) -> EngineResult<bool> {
        let mut attempts = lock(&self.attempts);
        match attempts.get_mut(&attempt.id) {
            Some(stored)
                if stored.status == expected_status && stored.revision == expected_revision =>
            {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_for_quiz(&self, quiz_id: &str) -> EngineResult<u64> {
        let mut attempts = lock(&self.attempts);
        let before = attempts.len();
        attempts.retain(|_, a| a.quiz_id != quiz_id);
        Ok((before - attempts.len()) as u64)
    }

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::fixtures::sample_quiz;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn second_live_attempt_returns_the_first() {
        let repo = InMemoryAttemptRepository::new();
        let quiz = sample_quiz();
        let first = Attempt::start(&quiz, "learner-1", Utc::now());
        let second = Attempt::start(&quiz, "learner-1", Utc::now());

        assert_eq!(
            repo.insert_attempt(&first).await.unwrap(),
            InsertOutcome::Created(first.clone())
        );
        assert_eq!(
            repo.insert_attempt(&second).await.unwrap(),
            InsertOutcome::Existing(first)
        );
    }

    #[tokio::test]
    async fn update_if_rejects_stale_revision() {
        let repo = InMemoryAttemptRepository::new();
        let attempt = Attempt::start(&sample_quiz(), "learner-1", Utc::now());
        repo.insert_attempt(&attempt).await.unwrap();

        let mut next = attempt.clone();
        next.status = AttemptStatus::Graded;
        next.revision = 1;
        assert!(repo
            .update_if(&next, AttemptStatus::InProgress, 0)
            .await
            .unwrap());
        assert!(!repo
            .update_if(&next, AttemptStatus::InProgress, 0)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn learner_history_is_newest_first() {
        let repo = InMemoryAttemptRepository::new();
        let quiz = sample_quiz();
        let now = Utc::now();
        for minutes in [30, 10, 20] {
            let mut attempt = Attempt::start(&quiz, "learner-1", now - Duration::minutes(minutes));
            attempt.status = AttemptStatus::Graded;
            repo.insert_attempt(&attempt).await.unwrap();
        }
        repo.insert_attempt(&Attempt::start(&quiz, "learner-2", now))
            .await
            .unwrap();

        let history = repo.list_for_learner(&quiz.id, "learner-1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].started_at > history[1].started_at);
        assert!(history[1].started_at > history[2].started_at);
    }

    #[tokio::test]
    async fn one_quiz_per_lesson() {
        let repo = InMemoryQuizRepository::new();
        let quiz = sample_quiz();
        repo.insert(&quiz).await.unwrap();

        let mut other = sample_quiz();
        other.id = "quiz-2".to_string();
        assert!(matches!(
            repo.insert(&other).await,
            Err(QuizError::Conflict(_))
        ));
    }
}
