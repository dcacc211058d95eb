use serde::{Deserialize, Serialize};

use super::attempt::AttemptSummary;

/// Read-only view of a learner's history on one quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizStatusSummary {
    pub quiz_id: String,
    pub title: String,
    pub description: String,
    pub time_limit_seconds: u32,
    pub passing_score: u32,
    pub max_attempts: i32,
    pub attempt_count: usize,
    /// -1 when unlimited.
    pub remaining_attempts: i64,
    pub best_score: Option<f64>,
    pub has_passed: bool,
    pub can_attempt: bool,
    pub in_progress_attempt: Option<AttemptSummary>,
    /// Newest first.
    pub attempts: Vec<AttemptSummary>,
}
