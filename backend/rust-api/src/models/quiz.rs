use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use validator::Validate;

use crate::error::{EngineResult, QuizError};

pub const DEFAULT_PASSING_SCORE: u32 = 70;
pub const DEFAULT_QUESTION_POINTS: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[default]
    SingleChoice,
    MultiChoice,
    TrueFalse,
    FreeText,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultiChoice => "multi_choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::FreeText => "free_text",
        }
    }

    pub fn is_choice(&self) -> bool {
        !matches!(self, QuestionKind::FreeText)
    }

    /// Choice kinds where exactly one option may be selected.
    pub fn is_single_select(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::TrueFalse)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizOption {
    pub id: String,
    pub question_id: String,
    pub text: String,
    pub is_correct: bool,
    pub order_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    pub quiz_id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub explanation: Option<String>,
    pub points: u32,
    #[serde(default)]
    pub required: bool,
    pub order_index: u32,
    #[serde(default)]
    pub options: Vec<QuizOption>,
    /// Free-text only: the answer a response must match to earn points.
    #[serde(default)]
    pub expected_answer: Option<String>,
}

impl Question {
    /// Checks the per-kind option invariants.
    pub fn validate(&self) -> EngineResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(QuizError::validation(format!(
                "question {}: prompt must not be empty",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for option in &self.options {
            if !seen.insert(option.id.as_str()) {
                return Err(QuizError::validation(format!(
                    "question {}: duplicate option id {}",
                    self.id, option.id
                )));
            }
        }

        let correct = self.options.iter().filter(|o| o.is_correct).count();
        match self.kind {
            QuestionKind::SingleChoice | QuestionKind::TrueFalse if correct != 1 => {
                Err(QuizError::validation(format!(
                    "question {}: {} requires exactly one correct option, found {}",
                    self.id, self.kind, correct
                )))
            }
            QuestionKind::MultiChoice if correct == 0 => Err(QuizError::validation(format!(
                "question {}: multi_choice requires at least one correct option",
                self.id
            ))),
            QuestionKind::FreeText if !self.options.is_empty() => {
                Err(QuizError::validation(format!(
                    "question {}: free_text questions cannot have options",
                    self.id
                )))
            }
            kind if kind.is_choice() && self.expected_answer.is_some() => {
                Err(QuizError::validation(format!(
                    "question {}: expected_answer is only allowed on free_text questions",
                    self.id
                )))
            }
            _ => Ok(()),
        }
    }

    /// Replaces the whole option set; the question is left untouched when the
    /// new set would break its invariants.
    pub fn replace_options(&mut self, options: Vec<QuizOption>) -> EngineResult<()> {
        let previous = std::mem::replace(&mut self.options, options);
        if let Err(err) = self.validate() {
            self.options = previous;
            return Err(err);
        }
        Ok(())
    }

    pub fn correct_option_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    pub fn ordered_options(&self) -> Vec<&QuizOption> {
        let mut options: Vec<&QuizOption> = self.options.iter().collect();
        options.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
        options
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: String,
    pub lesson_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Seconds; 0 means unlimited.
    pub time_limit_seconds: u32,
    /// Percentage threshold, 0..=100.
    pub passing_score: u32,
    /// 0 or negative means unlimited.
    pub max_attempts: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_options: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(with = "super::bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "super::bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn validate(&self) -> EngineResult<()> {
        if self.passing_score > 100 {
            return Err(QuizError::validation(
                "passing_score must be between 0 and 100",
            ));
        }
        let mut seen = HashSet::new();
        for question in &self.questions {
            if !seen.insert(question.id.as_str()) {
                return Err(QuizError::validation(format!(
                    "duplicate question id {}",
                    question.id
                )));
            }
            question.validate()?;
        }
        Ok(())
    }

    /// Questions in canonical display order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.id.cmp(&b.id)));
        questions
    }

    pub fn total_points(&self) -> u32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_mut(&mut self, question_id: &str) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == question_id)
    }

    pub fn has_time_limit(&self) -> bool {
        self.time_limit_seconds > 0
    }

    pub fn has_attempt_limit(&self) -> bool {
        self.max_attempts > 0
    }

    pub fn ensure_attemptable(&self) -> EngineResult<()> {
        if self.questions.is_empty() {
            return Err(QuizError::QuizNotAttemptable(format!(
                "quiz {} has no questions",
                self.id
            )));
        }
        if self.total_points() == 0 {
            return Err(QuizError::QuizNotAttemptable(format!(
                "quiz {} has zero total points",
                self.id
            )));
        }
        Ok(())
    }

    pub fn next_order_index(&self) -> u32 {
        self.questions
            .iter()
            .map(|q| q.order_index + 1)
            .max()
            .unwrap_or(0)
    }
}

// ---- Learner-facing projections (correctness hidden) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerOptionView {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerQuestionView {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: u32,
    pub required: bool,
    pub options: Vec<LearnerOptionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerQuizView {
    pub id: String,
    pub lesson_id: String,
    pub title: String,
    pub description: String,
    pub time_limit_seconds: u32,
    pub passing_score: u32,
    pub max_attempts: i32,
    pub total_points: u32,
    /// The in-progress attempt whose seed produced this ordering, if any.
    pub attempt_id: Option<String>,
    pub questions: Vec<LearnerQuestionView>,
}

// ---- Authoring requests ----

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: String,

    #[serde(default)]
    pub time_limit_seconds: u32,

    /// Defaults to 70 when omitted.
    #[validate(range(max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<u32>,

    #[serde(default)]
    pub max_attempts: i32,

    #[serde(default)]
    pub shuffle_questions: bool,

    #[serde(default)]
    pub shuffle_options: bool,

    #[serde(default)]
    pub show_correct_answers: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title must be between 1 and 200 characters"
    ))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub time_limit_seconds: Option<u32>,

    #[validate(range(max = 100, message = "Passing score must be between 0 and 100"))]
    pub passing_score: Option<u32>,

    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub shuffle_options: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOptionRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Option text must be between 1 and 1000 characters"
    ))]
    pub text: String,

    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    /// Defaults to single_choice.
    #[serde(default)]
    pub kind: QuestionKind,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Prompt must be between 1 and 5000 characters"
    ))]
    pub prompt: String,

    pub explanation: Option<String>,

    /// Defaults to 1.
    #[validate(range(max = 10000, message = "Points must be between 0 and 10000"))]
    pub points: Option<u32>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    #[validate(nested)]
    pub options: Vec<CreateOptionRequest>,

    pub expected_answer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    pub kind: Option<QuestionKind>,

    #[validate(length(
        min = 1,
        max = 5000,
        message = "Prompt must be between 1 and 5000 characters"
    ))]
    pub prompt: Option<String>,

    pub explanation: Option<String>,

    #[validate(range(max = 10000, message = "Points must be between 0 and 10000"))]
    pub points: Option<u32>,

    pub required: Option<bool>,

    /// Replaces the whole option set when present.
    #[validate(nested)]
    pub options: Option<Vec<CreateOptionRequest>>,

    pub expected_answer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReorderQuestionsRequest {
    #[validate(length(min = 1, message = "question_ids must not be empty"))]
    pub question_ids: Vec<String>,
}
