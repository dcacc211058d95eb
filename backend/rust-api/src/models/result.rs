use serde::{Deserialize, Serialize};

use super::attempt::AttemptStatus;
use super::quiz::QuestionKind;

/// Grading outcome for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradedAnswer {
    pub question_id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    /// Sorted and deduplicated.
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    pub answered: bool,
    pub is_correct: bool,
    pub points_earned: u32,
    pub max_points: u32,
    pub unanswered_required: bool,
    /// Free-text question without an expected answer; needs a human.
    pub pending_review: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correct_option_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Pure output of the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grade {
    pub earned_points: u32,
    pub total_points: u32,
    pub score_percentage: f64,
    pub passed: bool,
    pub correct_count: u32,
    pub total_questions: u32,
    pub answers: Vec<GradedAnswer>,
}

/// Result owned by the attempt that produced it. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptResult {
    pub attempt_id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub time_spent_seconds: i64,
    pub grade: Grade,
}

impl AttemptResult {
    /// Learner-facing copy. Correct options, expected answers and explanations
    /// are only kept when the quiz reveals them.
    pub fn for_learner(&self, show_correct_answers: bool) -> AttemptResult {
        let mut view = self.clone();
        if !show_correct_answers {
            for answer in &mut view.grade.answers {
                answer.correct_option_ids.clear();
                answer.expected_answer = None;
                answer.explanation = None;
            }
        }
        view
    }
}
