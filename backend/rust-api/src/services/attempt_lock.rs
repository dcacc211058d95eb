//! Per-(quiz, learner) mutual exclusion for Start, Stage and Submit.
//!
//! The lock only serialises work; correctness still rests on the repository's
//! compare-and-swap writes, so a lease that lapses mid-operation degrades to a
//! lost race instead of a double write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::config::LockConfig;
use crate::error::{EngineResult, QuizError};

const RELEASE_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

const RETRY_INTERVAL: Duration = Duration::from_millis(25);
const PRUNE_THRESHOLD: usize = 1024;

pub fn lock_key(quiz_id: &str, learner_id: &str) -> String {
    format!("quiz:attempt-lock:{}:{}", quiz_id, learner_id)
}

/// Held for the duration of one engine operation; releases on drop.
pub enum LockGuard {
    Local(OwnedMutexGuard<()>),
    Redis(RedisLease),
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockGuard::Local(_) => f.write_str("LockGuard::Local"),
            LockGuard::Redis(lease) => write!(f, "LockGuard::Redis({})", lease.key),
        }
    }
}

pub struct RedisLease {
    redis: ConnectionManager,
    key: String,
    token: String,
}

impl Drop for RedisLease {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime left; the PX lease expires on its own.
            return;
        };
        let mut conn = self.redis.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            let released: redis::RedisResult<i32> = redis::Script::new(RELEASE_SCRIPT)
                .key(&key)
                .arg(&token)
                .invoke_async(&mut conn)
                .await;
            if let Err(e) = released {
                tracing::warn!("Failed to release attempt lock {}: {}", key, e);
            }
        });
    }
}

#[async_trait]
pub trait AttemptLock: Send + Sync {
    /// Waits up to the configured time; `Unavailable` when the lock stays taken.
    async fn acquire(&self, quiz_id: &str, learner_id: &str) -> EngineResult<LockGuard>;

    async fn ping(&self) -> EngineResult<()>;
}

pub struct RedisAttemptLock {
    redis: ConnectionManager,
    config: LockConfig,
}

impl RedisAttemptLock {
    pub fn new(redis: ConnectionManager, config: LockConfig) -> Self {
        Self { redis, config }
    }
}

fn redis_unavailable(err: redis::RedisError) -> QuizError {
    tracing::error!("Redis lock backend error: {}", err);
    QuizError::Unavailable(format!("lock backend: {}", err))
}

#[async_trait]
impl AttemptLock for RedisAttemptLock {
    async fn acquire(&self, quiz_id: &str, learner_id: &str) -> EngineResult<LockGuard> {
        let key = lock_key(quiz_id, learner_id);
        let token = Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.wait_ms);
        let mut conn = self.redis.clone();

        loop {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(self.config.ttl_ms)
                .query_async(&mut conn)
                .await
                .map_err(redis_unavailable)?;

            if acquired.is_some() {
                return Ok(LockGuard::Redis(RedisLease {
                    redis: self.redis.clone(),
                    key,
                    token,
                }));
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("Timed out waiting for attempt lock {}", key);
                return Err(QuizError::Unavailable(format!(
                    "attempt lock busy for quiz {}",
                    quiz_id
                )));
            }

            let jitter = Duration::from_millis(rand::random::<u64>() % 10);
            tokio::time::sleep(RETRY_INTERVAL + jitter).await;
        }
    }

    async fn ping(&self) -> EngineResult<()> {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(redis_unavailable)?;
        Ok(())
    }
}

/// In-process lock table for tests and single-node deployments.
pub struct LocalAttemptLock {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    wait: Duration,
}

impl LocalAttemptLock {
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            wait,
        }
    }

    fn entry(&self, key: String) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            // Entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(key).or_default().clone()
    }
}

impl Default for LocalAttemptLock {
    fn default() -> Self {
        Self::new(Duration::from_millis(LockConfig::default().wait_ms))
    }
}

#[async_trait]
impl AttemptLock for LocalAttemptLock {
    async fn acquire(&self, quiz_id: &str, learner_id: &str) -> EngineResult<LockGuard> {
        let lock = self.entry(lock_key(quiz_id, learner_id));
        match tokio::time::timeout(self.wait, lock.lock_owned()).await {
            Ok(guard) => Ok(LockGuard::Local(guard)),
            Err(_) => Err(QuizError::Unavailable(format!(
                "attempt lock busy for quiz {}",
                quiz_id
            ))),
        }
    }

    async fn ping(&self) -> EngineResult<()> {
        Ok(())
    }
}
