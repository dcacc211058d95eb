use crate::config::PolicyConfig;
use crate::models::{Attempt, AttemptStatus, AttemptSummary, Quiz, QuizStatusSummary};

/// Folds a learner's attempt history into a read-only summary. Never mutates.
pub fn project(quiz: &Quiz, history: &[Attempt], policy: &PolicyConfig) -> QuizStatusSummary {
    let mut attempts: Vec<AttemptSummary> = history.iter().map(Attempt::summary).collect();
    attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));

    let finalized = history.iter().filter(|a| a.status.is_finalized()).count() as i64;
    let remaining_attempts = if quiz.has_attempt_limit() {
        (i64::from(quiz.max_attempts) - finalized).max(0)
    } else {
        -1
    };

    let best_score = history
        .iter()
        .filter(|a| a.status.is_finalized())
        .filter_map(|a| a.score)
        .fold(None, |best: Option<f64>, score| {
            Some(best.map_or(score, |b| b.max(score)))
        });

    let has_passed = history.iter().any(|a| a.passed == Some(true));
    let in_progress_attempt = attempts
        .iter()
        .find(|a| a.status == AttemptStatus::InProgress)
        .cloned();

    let can_attempt = in_progress_attempt.is_some()
        || (remaining_attempts != 0 && !(policy.block_after_pass && has_passed));

    QuizStatusSummary {
        quiz_id: quiz.id.clone(),
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        time_limit_seconds: quiz.time_limit_seconds,
        passing_score: quiz.passing_score,
        max_attempts: quiz.max_attempts,
        attempt_count: attempts.len(),
        remaining_attempts,
        best_score,
        has_passed,
        can_attempt,
        in_progress_attempt,
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::fixtures::sample_quiz;
    use chrono::{Duration, Utc};

    fn attempt_at(
        quiz: &Quiz,
        minutes_ago: i64,
        status: AttemptStatus,
        score: Option<f64>,
    ) -> Attempt {
        let started_at = Utc::now() - Duration::minutes(minutes_ago);
        let mut attempt = Attempt::start(quiz, "learner-1", started_at);
        attempt.status = status;
        attempt.score = score;
        attempt.passed = score.map(|s| s >= f64::from(quiz.passing_score));
        attempt
    }

    #[test]
    fn empty_history() {
        let quiz = sample_quiz();
        let summary = project(&quiz, &[], &PolicyConfig::default());
        assert_eq!(summary.attempt_count, 0);
        assert_eq!(summary.remaining_attempts, -1);
        assert_eq!(summary.best_score, None);
        assert!(!summary.has_passed);
        assert!(summary.can_attempt);
        assert!(summary.in_progress_attempt.is_none());
    }

    #[test]
    fn summarises_mixed_history() {
        let mut quiz = sample_quiz();
        quiz.max_attempts = 3;
        let history = vec![
            attempt_at(&quiz, 30, AttemptStatus::Graded, Some(50.0)),
            attempt_at(&quiz, 20, AttemptStatus::Expired, Some(0.0)),
            attempt_at(&quiz, 10, AttemptStatus::Graded, Some(80.0)),
            attempt_at(&quiz, 1, AttemptStatus::InProgress, None),
        ];

        let summary = project(&quiz, &history, &PolicyConfig::default());
        assert_eq!(summary.attempt_count, 4);
        assert_eq!(summary.remaining_attempts, 0);
        assert_eq!(summary.best_score, Some(80.0));
        assert!(summary.has_passed);
        assert!(summary.can_attempt);
        assert_eq!(
            summary.in_progress_attempt.as_ref().map(|a| a.id.as_str()),
            Some(history[3].id.as_str())
        );

        let started: Vec<_> = summary.attempts.iter().map(|a| a.started_at).collect();
        let mut sorted = started.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(started, sorted);
    }

    #[test]
    fn exhausted_attempts_cannot_start() {
        let mut quiz = sample_quiz();
        quiz.max_attempts = 1;
        let history = vec![attempt_at(&quiz, 5, AttemptStatus::Graded, Some(10.0))];
        let summary = project(&quiz, &history, &PolicyConfig::default());
        assert_eq!(summary.remaining_attempts, 0);
        assert!(!summary.can_attempt);
    }

    #[test]
    fn pass_blocking_is_reflected_in_can_attempt() {
        let quiz = sample_quiz();
        let history = vec![attempt_at(&quiz, 5, AttemptStatus::Graded, Some(100.0))];
        let policy = PolicyConfig {
            block_after_pass: true,
            ..PolicyConfig::default()
        };
        assert!(!project(&quiz, &history, &policy).can_attempt);
        assert!(project(&quiz, &history, &PolicyConfig::default()).can_attempt);
    }
}
