//! Learner-facing quiz projection.
//!
//! Shuffling only changes the order items are shown in. The generator is
//! seeded from the attempt, so every view of the same attempt is identical.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::models::{
    Attempt, LearnerOptionView, LearnerQuestionView, LearnerQuizView, Question, Quiz,
};

/// Builds the learner view. Without an attempt the canonical order is used.
pub fn learner_view(quiz: &Quiz, attempt: Option<&Attempt>) -> LearnerQuizView {
    let mut questions: Vec<&Question> = quiz.ordered_questions();
    let mut rng = attempt.map(|a| StdRng::seed_from_u64(a.presentation_seed()));

    if let (true, Some(rng)) = (quiz.shuffle_questions, rng.as_mut()) {
        questions.shuffle(rng);
    }

    let questions = questions
        .into_iter()
        .map(|question| {
            let mut options = question.ordered_options();
            if let (true, Some(rng)) = (quiz.shuffle_options, rng.as_mut()) {
                options.shuffle(rng);
            }

            LearnerQuestionView {
                id: question.id.clone(),
                kind: question.kind,
                prompt: question.prompt.clone(),
                points: question.points,
                required: question.required,
                options: options
                    .into_iter()
                    .map(|option| LearnerOptionView {
                        id: option.id.clone(),
                        text: option.text.clone(),
                    })
                    .collect(),
            }
        })
        .collect();

    LearnerQuizView {
        id: quiz.id.clone(),
        lesson_id: quiz.lesson_id.clone(),
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        time_limit_seconds: quiz.time_limit_seconds,
        passing_score: quiz.passing_score,
        max_attempts: quiz.max_attempts,
        total_points: quiz.total_points(),
        attempt_id: attempt.map(|a| a.id.clone()),
        questions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::fixtures::{option, question, quiz};
    use crate::models::QuestionKind;
    use chrono::Utc;

    fn large_quiz() -> Quiz {
        let questions = (0..12)
            .map(|i| {
                let qid = format!("q{}", i);
                let options = (0..5)
                    .map(|j| option(&qid, &format!("{}-o{}", qid, j), j == 0, j))
                    .collect();
                question(&qid, QuestionKind::SingleChoice, 1, i, options)
            })
            .collect();
        let mut quiz = quiz(questions);
        quiz.shuffle_questions = true;
        quiz.shuffle_options = true;
        quiz
    }

    fn order(view: &LearnerQuizView) -> Vec<String> {
        view.questions
            .iter()
            .flat_map(|q| {
                std::iter::once(q.id.clone()).chain(q.options.iter().map(|o| o.id.clone()))
            })
            .collect()
    }

    #[test]
    fn same_attempt_reproduces_the_same_order() {
        let quiz = large_quiz();
        let attempt = Attempt::start(&quiz, "learner-1", Utc::now());

        let first = learner_view(&quiz, Some(&attempt));
        let second = learner_view(&quiz, Some(&attempt));
        assert_eq!(order(&first), order(&second));
        assert_eq!(first.attempt_id.as_deref(), Some(attempt.id.as_str()));
    }

    #[test]
    fn shuffling_keeps_every_item() {
        let quiz = large_quiz();
        let attempt = Attempt::start(&quiz, "learner-1", Utc::now());
        let view = learner_view(&quiz, Some(&attempt));

        let mut ids: Vec<String> = view.questions.iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let mut expected: Vec<String> = quiz.questions.iter().map(|q| q.id.clone()).collect();
        expected.sort();
        assert_eq!(ids, expected);
        assert!(view.questions.iter().all(|q| q.options.len() == 5));
    }

    #[test]
    fn no_attempt_means_canonical_order() {
        let quiz = large_quiz();
        let view = learner_view(&quiz, None);
        let ids: Vec<&str> = view.questions.iter().map(|q| q.id.as_str()).collect();
        let expected: Vec<&str> = quiz.ordered_questions().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, expected);
        assert!(view.attempt_id.is_none());
    }

    #[test]
    fn shuffle_disabled_keeps_canonical_order() {
        let mut quiz = large_quiz();
        quiz.shuffle_questions = false;
        quiz.shuffle_options = false;
        let attempt = Attempt::start(&quiz, "learner-1", Utc::now());
        let view = learner_view(&quiz, Some(&attempt));
        assert_eq!(view.questions[0].id, "q0");
        assert_eq!(view.questions[0].options[0].id, "q0-o0");
    }

    #[test]
    fn learner_view_never_serializes_correctness() {
        let quiz = large_quiz();
        let json = serde_json::to_string(&learner_view(&quiz, None)).unwrap();
        assert!(!json.contains("is_correct"));
        assert!(!json.contains("explanation"));
        assert!(!json.contains("expected_answer"));
    }
}
