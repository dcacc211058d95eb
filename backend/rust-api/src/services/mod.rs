use std::sync::Arc;
use std::time::Duration;

use mongodb::Client as MongoClient;
use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::repository::{
    mongo::ensure_indexes, AttemptRepository, MongoAttemptRepository, MongoQuizRepository,
    QuizRepository,
};
use crate::services::attempt_lock::{AttemptLock, RedisAttemptLock};
use crate::services::enrollment::{AllowAllEnrollment, EnrollmentChecker, HttpEnrollmentChecker};
use crate::utils::time::{Clock, SystemClock};

pub mod attempt_lock;
pub mod attempt_policy;
pub mod attempt_service;
pub mod enrollment;
pub mod presentation;
pub mod quiz_admin_service;
pub mod scoring;
pub mod status_projector;

/// Shared per-process state. Services borrow it per request.
pub struct AppState {
    pub config: Config,
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub locks: Arc<dyn AttemptLock>,
    pub enrollment: Arc<dyn EnrollmentChecker>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        ensure_indexes(&mongo).await?;

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        let mut conn = redis.clone();
        tokio::time::timeout(
            Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        let enrollment: Arc<dyn EnrollmentChecker> = match &config.enrollment_api_url {
            Some(url) => {
                tracing::info!("Enrollment checks go to {}", url);
                Arc::new(HttpEnrollmentChecker::new(url.clone())?)
            }
            None => {
                tracing::warn!("No enrollment service configured; every learner is admitted");
                Arc::new(AllowAllEnrollment)
            }
        };

        Ok(Self {
            quizzes: Arc::new(MongoQuizRepository::new(mongo.clone())),
            attempts: Arc::new(MongoAttemptRepository::new(mongo)),
            locks: Arc::new(RedisAttemptLock::new(redis, config.lock.clone())),
            enrollment,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Assembles state from explicit collaborators (tests, embedded use).
    pub fn from_parts(
        config: Config,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        locks: Arc<dyn AttemptLock>,
        enrollment: Arc<dyn EnrollmentChecker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            quizzes,
            attempts,
            locks,
            enrollment,
            clock,
        }
    }
}
