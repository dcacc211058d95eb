use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{EngineResult, QuizError};
use crate::utils::retry::{retry_async_when, RetryConfig};

/// Answers "may this learner take quizzes of this lesson?".
#[async_trait]
pub trait EnrollmentChecker: Send + Sync {
    async fn is_enrolled(&self, learner_id: &str, lesson_id: &str) -> EngineResult<bool>;
}

/// Used when no enrollment service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllEnrollment;

#[async_trait]
impl EnrollmentChecker for AllowAllEnrollment {
    async fn is_enrolled(&self, _learner_id: &str, _lesson_id: &str) -> EngineResult<bool> {
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
struct EnrollmentCheckResponse {
    enrolled: bool,
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("enrollment service returned {0}")]
    Status(reqwest::StatusCode),
}

impl CheckError {
    fn is_transient(&self) -> bool {
        match self {
            CheckError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CheckError::Status(status) => status.is_server_error(),
        }
    }
}

pub struct HttpEnrollmentChecker {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpEnrollmentChecker {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    async fn check_once(&self, learner_id: &str, lesson_id: &str) -> Result<bool, CheckError> {
        let response = self
            .client
            .get(format!("{}/internal/enrollments/check", self.base_url))
            .query(&[("user_id", learner_id), ("lesson_id", lesson_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CheckError::Status(response.status()));
        }

        let body: EnrollmentCheckResponse = response.json().await?;
        Ok(body.enrolled)
    }
}

#[async_trait]
impl EnrollmentChecker for HttpEnrollmentChecker {
    async fn is_enrolled(&self, learner_id: &str, lesson_id: &str) -> EngineResult<bool> {
        retry_async_when(&self.retry, CheckError::is_transient, || {
            self.check_once(learner_id, lesson_id)
        })
        .await
        .map_err(|e| {
            tracing::error!(
                "Enrollment check failed for learner {} lesson {}: {}",
                learner_id,
                lesson_id,
                e
            );
            QuizError::Unavailable(format!("enrollment service: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_admits_everyone() {
        assert!(AllowAllEnrollment
            .is_enrolled("anyone", "any-lesson")
            .await
            .unwrap());
    }

    #[test]
    fn only_server_errors_are_retried() {
        assert!(CheckError::Status(reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(!CheckError::Status(reqwest::StatusCode::NOT_FOUND).is_transient());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let checker = HttpEnrollmentChecker::new("http://enrollment:8080/").unwrap();
        assert_eq!(checker.base_url, "http://enrollment:8080");
    }
}
