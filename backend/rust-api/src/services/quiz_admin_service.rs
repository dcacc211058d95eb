use std::collections::HashSet;

use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineResult, QuizError};
use crate::models::quiz::{
    CreateOptionRequest, CreateQuestionRequest, CreateQuizRequest, ReorderQuestionsRequest,
    UpdateQuestionRequest, UpdateQuizRequest, DEFAULT_PASSING_SCORE, DEFAULT_QUESTION_POINTS,
};
use crate::models::{Question, Quiz, QuizOption};
use crate::services::AppState;

/// Instructor-side quiz authoring. Returns full documents, correctness included.
pub struct QuizAdminService<'a> {
    state: &'a AppState,
}

fn build_options(question_id: &str, requests: Vec<CreateOptionRequest>) -> Vec<QuizOption> {
    requests
        .into_iter()
        .enumerate()
        .map(|(index, option)| QuizOption {
            id: Uuid::new_v4().to_string(),
            question_id: question_id.to_string(),
            text: option.text,
            is_correct: option.is_correct,
            order_index: index as u32,
        })
        .collect()
}

/// Blank strings clear optional text fields.
fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl<'a> QuizAdminService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn create_quiz(&self, lesson_id: &str, req: CreateQuizRequest) -> EngineResult<Quiz> {
        req.validate()?;
        if lesson_id.trim().is_empty() {
            return Err(QuizError::validation("lesson_id must not be empty"));
        }

        let now = self.state.clock.now();
        let quiz = Quiz {
            id: Uuid::new_v4().to_string(),
            lesson_id: lesson_id.to_string(),
            title: req.title,
            description: req.description,
            time_limit_seconds: req.time_limit_seconds,
            passing_score: req.passing_score.unwrap_or(DEFAULT_PASSING_SCORE),
            max_attempts: req.max_attempts,
            shuffle_questions: req.shuffle_questions,
            shuffle_options: req.shuffle_options,
            show_correct_answers: req.show_correct_answers,
            questions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        quiz.validate()?;

        self.state.quizzes.insert(&quiz).await?;
        tracing::info!("Created quiz {} for lesson {}", quiz.id, quiz.lesson_id);
        Ok(quiz)
    }

    pub async fn get_quiz(&self, quiz_id: &str) -> EngineResult<Quiz> {
        self.state
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| QuizError::QuizNotFound(quiz_id.to_string()))
    }

    pub async fn get_quiz_by_lesson(&self, lesson_id: &str) -> EngineResult<Quiz> {
        self.state
            .quizzes
            .find_by_lesson(lesson_id)
            .await?
            .ok_or_else(|| QuizError::QuizNotFound(format!("lesson {}", lesson_id)))
    }

    pub async fn update_quiz(&self, quiz_id: &str, req: UpdateQuizRequest) -> EngineResult<Quiz> {
        req.validate()?;
        let mut quiz = self.get_quiz(quiz_id).await?;

        if let Some(title) = req.title {
            quiz.title = title;
        }
        if let Some(description) = req.description {
            quiz.description = description;
        }
        if let Some(limit) = req.time_limit_seconds {
            quiz.time_limit_seconds = limit;
        }
        if let Some(score) = req.passing_score {
            quiz.passing_score = score;
        }
        if let Some(max) = req.max_attempts {
            quiz.max_attempts = max;
        }
        if let Some(flag) = req.shuffle_questions {
            quiz.shuffle_questions = flag;
        }
        if let Some(flag) = req.shuffle_options {
            quiz.shuffle_options = flag;
        }
        if let Some(flag) = req.show_correct_answers {
            quiz.show_correct_answers = flag;
        }

        self.save(quiz).await
    }

    /// Removes the quiz, its questions and every attempt made on it.
    pub async fn delete_quiz(&self, quiz_id: &str) -> EngineResult<()> {
        if !self.state.quizzes.delete(quiz_id).await? {
            return Err(QuizError::QuizNotFound(quiz_id.to_string()));
        }
        let removed = self.state.attempts.delete_for_quiz(quiz_id).await?;
        tracing::info!("Deleted quiz {} and {} attempts", quiz_id, removed);
        Ok(())
    }

    pub async fn add_question(
        &self,
        quiz_id: &str,
        req: CreateQuestionRequest,
    ) -> EngineResult<Question> {
        req.validate()?;
        let mut quiz = self.get_quiz(quiz_id).await?;

        let id = Uuid::new_v4().to_string();
        let question = Question {
            options: build_options(&id, req.options),
            id,
            quiz_id: quiz.id.clone(),
            kind: req.kind,
            prompt: req.prompt,
            explanation: req.explanation.and_then(non_blank),
            points: req.points.unwrap_or(DEFAULT_QUESTION_POINTS),
            required: req.required,
            order_index: quiz.next_order_index(),
            expected_answer: req.expected_answer.and_then(non_blank),
        };
        question.validate()?;

        quiz.questions.push(question.clone());
        self.save(quiz).await?;
        tracing::info!("Added {} question {} to quiz {}", question.kind, question.id, quiz_id);
        Ok(question)
    }

    pub async fn update_question(
        &self,
        quiz_id: &str,
        question_id: &str,
        req: UpdateQuestionRequest,
    ) -> EngineResult<Question> {
        req.validate()?;
        let mut quiz = self.get_quiz(quiz_id).await?;
        let question = quiz
            .question_mut(question_id)
            .ok_or_else(|| QuizError::QuestionNotFound(question_id.to_string()))?;

        let mut updated = question.clone();
        if let Some(kind) = req.kind {
            updated.kind = kind;
        }
        if let Some(prompt) = req.prompt {
            updated.prompt = prompt;
        }
        if let Some(explanation) = req.explanation {
            updated.explanation = non_blank(explanation);
        }
        if let Some(points) = req.points {
            updated.points = points;
        }
        if let Some(required) = req.required {
            updated.required = required;
        }
        if let Some(expected) = req.expected_answer {
            updated.expected_answer = non_blank(expected);
        }

        match req.options {
            Some(options) => {
                let options = build_options(&updated.id, options);
                updated.replace_options(options)?;
            }
            None => updated.validate()?,
        }

        *question = updated.clone();
        self.save(quiz).await?;
        tracing::info!("Updated question {} on quiz {}", question_id, quiz_id);
        Ok(updated)
    }

    pub async fn delete_question(&self, quiz_id: &str, question_id: &str) -> EngineResult<()> {
        let mut quiz = self.get_quiz(quiz_id).await?;
        let before = quiz.questions.len();
        quiz.questions.retain(|q| q.id != question_id);
        if quiz.questions.len() == before {
            return Err(QuizError::QuestionNotFound(question_id.to_string()));
        }

        self.save(quiz).await?;
        tracing::info!("Deleted question {} from quiz {}", question_id, quiz_id);
        Ok(())
    }

    /// `question_ids` must name every question of the quiz exactly once.
    pub async fn reorder_questions(
        &self,
        quiz_id: &str,
        req: ReorderQuestionsRequest,
    ) -> EngineResult<Quiz> {
        req.validate()?;
        let mut quiz = self.get_quiz(quiz_id).await?;

        let requested: HashSet<&str> = req.question_ids.iter().map(String::as_str).collect();
        let existing: HashSet<&str> = quiz.questions.iter().map(|q| q.id.as_str()).collect();
        if requested.len() != req.question_ids.len() || requested != existing {
            return Err(QuizError::validation(
                "question_ids must list every question of the quiz exactly once",
            ));
        }

        for (index, question_id) in req.question_ids.iter().enumerate() {
            if let Some(question) = quiz.question_mut(question_id) {
                question.order_index = index as u32;
            }
        }

        self.save(quiz).await
    }

    async fn save(&self, mut quiz: Quiz) -> EngineResult<Quiz> {
        quiz.validate()?;
        quiz.updated_at = self.state.clock.now();
        self.state.quizzes.replace(&quiz).await?;
        Ok(quiz)
    }
}
