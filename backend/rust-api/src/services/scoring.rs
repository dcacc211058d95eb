//! Scoring engine.
//!
//! `grade` is a pure function of the quiz definition and the answer set: no
//! clock, no randomness, no I/O. Feeding it the same inputs twice yields equal
//! [`Grade`] values. `validate_answers` must run first; `grade` assumes a
//! well-formed payload and simply ignores entries it cannot match.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{EngineResult, QuizError};
use crate::models::{Answer, Grade, GradedAnswer, Question, QuestionKind, Quiz};

/// Rejects malformed answer payloads before any state is touched.
pub fn validate_answers(quiz: &Quiz, answers: &[Answer]) -> EngineResult<()> {
    let mut seen = HashSet::new();

    for answer in answers {
        let question = quiz.question(&answer.question_id).ok_or_else(|| {
            QuizError::validation(format!(
                "answer references unknown question {}",
                answer.question_id
            ))
        })?;

        if !seen.insert(answer.question_id.as_str()) {
            return Err(QuizError::validation(format!(
                "question {} answered more than once",
                answer.question_id
            )));
        }

        if question.kind.is_choice() {
            if answer.text_answer.is_some() {
                return Err(QuizError::validation(format!(
                    "question {} is {} and does not accept text",
                    question.id, question.kind
                )));
            }

            if let Some(unknown) = answer
                .selected_option_ids
                .iter()
                .find(|id| !question.has_option(id))
            {
                return Err(QuizError::validation(format!(
                    "option {} does not belong to question {}",
                    unknown, question.id
                )));
            }

            let distinct: HashSet<&String> = answer.selected_option_ids.iter().collect();
            if question.kind.is_single_select() && distinct.len() > 1 {
                return Err(QuizError::validation(format!(
                    "question {} accepts a single option",
                    question.id
                )));
            }
        } else if !answer.selected_option_ids.is_empty() {
            return Err(QuizError::validation(format!(
                "question {} is free_text and does not accept options",
                question.id
            )));
        }
    }

    Ok(())
}

pub fn grade(quiz: &Quiz, answers: &[Answer]) -> Grade {
    let by_question: HashMap<&str, &Answer> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer))
        .collect();

    let breakdown: Vec<GradedAnswer> = quiz
        .ordered_questions()
        .into_iter()
        .map(|question| grade_question(question, by_question.get(question.id.as_str()).copied()))
        .collect();

    let total_points: u32 = breakdown.iter().map(|a| a.max_points).sum();
    let earned_points: u32 = breakdown.iter().map(|a| a.points_earned).sum();
    let correct_count = breakdown.iter().filter(|a| a.is_correct).count() as u32;
    let score_percentage = percentage(earned_points, total_points);

    Grade {
        earned_points,
        total_points,
        score_percentage,
        passed: score_percentage >= f64::from(quiz.passing_score),
        correct_count,
        total_questions: breakdown.len() as u32,
        answers: breakdown,
    }
}

fn grade_question(question: &Question, answer: Option<&Answer>) -> GradedAnswer {
    let selected: BTreeSet<String> = answer
        .map(|a| a.selected_option_ids.iter().cloned().collect())
        .unwrap_or_default();
    let text_answer = answer.and_then(|a| a.text_answer.clone());
    let answered = answer.map(|a| !a.is_blank()).unwrap_or(false);

    let pending_review = question.kind == QuestionKind::FreeText
        && question
            .expected_answer
            .as_deref()
            .map(|expected| expected.trim().is_empty())
            .unwrap_or(true);

    let is_correct = answered
        && match question.kind {
            QuestionKind::SingleChoice | QuestionKind::TrueFalse => {
                let correct = question.correct_option_ids();
                selected.len() == 1 && correct.len() == 1 && selected.contains(&correct[0])
            }
            // All-or-nothing: the selection must equal the correct set exactly.
            QuestionKind::MultiChoice => {
                let correct: BTreeSet<String> =
                    question.correct_option_ids().into_iter().collect();
                !correct.is_empty() && selected == correct
            }
            QuestionKind::FreeText => match (&question.expected_answer, &text_answer) {
                (Some(expected), Some(given)) if !pending_review => {
                    normalize_text(expected) == normalize_text(given)
                }
                _ => false,
            },
        };

    GradedAnswer {
        question_id: question.id.clone(),
        kind: question.kind,
        prompt: question.prompt.clone(),
        selected_option_ids: selected.into_iter().collect(),
        text_answer,
        answered,
        is_correct,
        points_earned: if is_correct { question.points } else { 0 },
        max_points: question.points,
        unanswered_required: question.required && !answered,
        pending_review,
        correct_option_ids: question.correct_option_ids(),
        expected_answer: question.expected_answer.clone(),
        explanation: question.explanation.clone(),
    }
}

fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

/// `100 * earned / total` rounded to two decimals; 0 when there is nothing to earn.
fn percentage(earned: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = 100.0 * f64::from(earned) / f64::from(total);
    ((raw * 100.0).round() / 100.0).clamp(0.0, 100.0)
}
