use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};

use super::{newest_first, AttemptRepository, InsertOutcome, QuizRepository};
use crate::error::{EngineResult, QuizError};
use crate::models::{Attempt, AttemptStatus, Quiz};

const QUIZZES: &str = "quizzes";
const ATTEMPTS: &str = "quiz_attempts";

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

/// Creates the indexes the repositories rely on. Safe to run on every boot.
pub async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    db.collection::<Quiz>(QUIZZES)
        .create_indexes([
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "lesson_id": 1 })
                .options(unique())
                .build(),
        ])
        .await
        .context("Failed to create quiz indexes")?;

    db.collection::<Attempt>(ATTEMPTS)
        .create_indexes([
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "quiz_id": 1, "learner_id": 1, "started_at": -1 })
                .build(),
            // At most one live attempt per (quiz, learner).
            IndexModel::builder()
                .keys(doc! { "quiz_id": 1, "learner_id": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("one_in_progress_per_learner".to_string())
                        .partial_filter_expression(doc! { "status": "in_progress" })
                        .build(),
                )
                .build(),
        ])
        .await
        .context("Failed to create attempt indexes")?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

async fn ping_database(db: &Database) -> EngineResult<()> {
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}

#[derive(Clone)]
pub struct MongoQuizRepository {
    db: Database,
}

impl MongoQuizRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<Quiz> {
        self.db.collection(QUIZZES)
    }
}

#[async_trait]
impl QuizRepository for MongoQuizRepository {
    async fn find_by_id(&self, quiz_id: &str) -> EngineResult<Option<Quiz>> {
        Ok(self.collection().find_one(doc! { "id": quiz_id }).await?)
    }

    async fn find_by_lesson(&self, lesson_id: &str) -> EngineResult<Option<Quiz>> {
        Ok(self
            .collection()
            .find_one(doc! { "lesson_id": lesson_id })
            .await?)
    }

    async fn insert(&self, quiz: &Quiz) -> EngineResult<()> {
        match self.collection().insert_one(quiz).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(QuizError::Conflict(format!(
                "lesson {} already has a quiz",
                quiz.lesson_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, quiz: &Quiz) -> EngineResult<()> {
        let result = self
            .collection()
            .replace_one(doc! { "id": quiz.id.as_str() }, quiz)
            .await?;
        if result.matched_count == 0 {
            return Err(QuizError::QuizNotFound(quiz.id.clone()));
        }
        Ok(())
    }

    async fn delete(&self, quiz_id: &str) -> EngineResult<bool> {
        let result = self.collection().delete_one(doc! { "id": quiz_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> EngineResult<()> {
        ping_database(&self.db).await
    }
}

#[derive(Clone)]
pub struct MongoAttemptRepository {
    db: Database,
}

impl MongoAttemptRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self) -> Collection<Attempt> {
        self.db.collection(ATTEMPTS)
    }

    async fn find_live(&self, quiz_id: &str, learner_id: &str) -> EngineResult<Option<Attempt>> {
        Ok(self
            .collection()
            .find_one(doc! {
                "quiz_id": quiz_id,
                "learner_id": learner_id,
                "status": AttemptStatus::InProgress.as_str(),
            })
            .await?)
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn insert_attempt(&self, attempt: &Attempt) -> EngineResult<InsertOutcome> {
        match self.collection().insert_one(attempt).await {
            Ok(_) => Ok(InsertOutcome::Created(attempt.clone())),
            Err(e) if is_duplicate_key(&e) => {
                match self.find_live(&attempt.quiz_id, &attempt.learner_id).await? {
                    Some(existing) => Ok(InsertOutcome::Existing(existing)),
                    // The live attempt finished between our insert and lookup.
                    None => Err(QuizError::Conflict(format!(
                        "concurrent attempt change for quiz {}",
                        attempt.quiz_id
                    ))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_attempt(&self, attempt_id: &str) -> EngineResult<Option<Attempt>> {
        Ok(self.collection().find_one(doc! { "id": attempt_id }).await?)
    }

    async fn list_for_learner(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<Vec<Attempt>> {
        let cursor = self
            .collection()
            .find(doc! { "quiz_id": quiz_id, "learner_id": learner_id })
            .await?;
        let mut attempts: Vec<Attempt> = cursor.try_collect().await?;
        newest_first(&mut attempts);
        Ok(attempts)
    }

    async fn update_if(
        &self,
        attempt: &Attempt,
        expected_status: AttemptStatus,
        expected_revision: i64,
    ) -> EngineResult<bool> {
        let result = self
            .collection()
            .replace_one(
                doc! {
                    "id": attempt.id.as_str(),
                    "status": expected_status.as_str(),
                    "revision": expected_revision,
                },
                attempt,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_for_quiz(&self, quiz_id: &str) -> EngineResult<u64> {
        let result = self
            .collection()
            .delete_many(doc! { "quiz_id": quiz_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> EngineResult<()> {
        ping_database(&self.db).await
    }
}
