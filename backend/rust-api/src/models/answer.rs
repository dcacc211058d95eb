use serde::{Deserialize, Serialize};

/// One learner response. Only ever stored inside its attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub question_id: String,
    #[serde(default)]
    pub selected_option_ids: Vec<String>,
    #[serde(default)]
    pub text_answer: Option<String>,
}

impl Answer {
    pub fn choice(question_id: impl Into<String>, option_ids: &[&str]) -> Self {
        Self {
            question_id: question_id.into(),
            selected_option_ids: option_ids.iter().map(|id| id.to_string()).collect(),
            text_answer: None,
        }
    }

    pub fn text(question_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            selected_option_ids: Vec::new(),
            text_answer: Some(text.into()),
        }
    }

    /// No selection and no non-blank text.
    pub fn is_blank(&self) -> bool {
        self.selected_option_ids.is_empty()
            && self
                .text_answer
                .as_deref()
                .map(|t| t.trim().is_empty())
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageAnswersRequest {
    #[serde(default)]
    pub answers: Vec<Answer>,
}
