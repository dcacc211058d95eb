use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::answer::Answer;
use super::bson_datetime;
use super::quiz::{LearnerQuizView, Quiz};
use super::result::AttemptResult;
use crate::error::{EngineResult, QuizError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Submitted,
    Graded,
    Expired,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::NotStarted => "not_started",
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
            AttemptStatus::Expired => "expired",
        }
    }

    pub fn can_transition_to(&self, next: AttemptStatus) -> bool {
        matches!(
            (self, next),
            (AttemptStatus::NotStarted, AttemptStatus::InProgress)
                | (AttemptStatus::InProgress, AttemptStatus::Submitted)
                | (AttemptStatus::InProgress, AttemptStatus::Expired)
                | (AttemptStatus::Submitted, AttemptStatus::Graded)
        )
    }

    /// Counts against `max_attempts`.
    pub fn is_finalized(&self) -> bool {
        matches!(self, AttemptStatus::Graded | AttemptStatus::Expired)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(AttemptStatus::NotStarted),
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "graded" => Ok(AttemptStatus::Graded),
            "expired" => Ok(AttemptStatus::Expired),
            _ => Err(format!("Invalid attempt status: {}", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attempt {
    pub id: String,
    pub quiz_id: String,
    pub learner_id: String,
    pub status: AttemptStatus,
    #[serde(with = "bson_datetime")]
    pub started_at: DateTime<Utc>,
    /// `started_at + time_limit`; absent for unlimited quizzes.
    #[serde(default, with = "bson_datetime::option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, with = "bson_datetime::option")]
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    #[serde(default)]
    pub staged_answers: Vec<Answer>,
    #[serde(default)]
    pub result: Option<AttemptResult>,
    /// Bumped on every persisted change; used for compare-and-swap writes.
    #[serde(default)]
    pub revision: i64,
}

impl Attempt {
    pub fn start(quiz: &Quiz, learner_id: &str, now: DateTime<Utc>) -> Self {
        let expires_at = quiz
            .has_time_limit()
            .then(|| now + Duration::seconds(i64::from(quiz.time_limit_seconds)));

        Self {
            id: Uuid::new_v4().to_string(),
            quiz_id: quiz.id.clone(),
            learner_id: learner_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: now,
            expires_at,
            completed_at: None,
            time_spent_seconds: None,
            score: None,
            passed: None,
            staged_answers: Vec::new(),
            result: None,
            revision: 0,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// True once `now - started_at` exceeds the time limit.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_in_progress() && self.expires_at.map(|deadline| now > deadline).unwrap_or(false)
    }

    pub fn transition(&mut self, next: AttemptStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(QuizError::AttemptNotInProgress {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn ensure_in_progress(&self) -> EngineResult<()> {
        if self.is_in_progress() {
            Ok(())
        } else {
            Err(QuizError::AttemptNotInProgress {
                id: self.id.clone(),
                status: self.status,
            })
        }
    }

    /// Stable seed for presentation shuffling (FNV-1a over the attempt id).
    pub fn presentation_seed(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        self.id.bytes().fold(OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(PRIME)
        })
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            id: self.id.clone(),
            quiz_id: self.quiz_id.clone(),
            learner_id: self.learner_id.clone(),
            status: self.status,
            started_at: self.started_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
            time_spent_seconds: self.time_spent_seconds,
            score: self.score,
            passed: self.passed,
            staged_answers: self.staged_answers.len(),
        }
    }
}

/// Attempt as exposed to learners: no stored result or staging internals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptSummary {
    pub id: String,
    pub quiz_id: String,
    pub learner_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    pub score: Option<f64>,
    pub passed: Option<bool>,
    /// Number of staged answers.
    pub staged_answers: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt: AttemptSummary,
    /// True when an existing in-progress attempt was returned.
    pub resumed: bool,
    pub quiz: LearnerQuizView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttemptListResponse {
    pub attempts: Vec<AttemptSummary>,
    pub total: usize,
}
