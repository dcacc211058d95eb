use crate::config::PolicyConfig;
use crate::error::{EngineResult, QuizError};
use crate::models::{Attempt, Quiz};

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The learner already has a live attempt; hand it back.
    Resume(Attempt),
    Create,
}

/// Decides whether a new attempt may start. `history` must already have had
/// overdue attempts expired.
pub fn evaluate(
    quiz: &Quiz,
    history: &[Attempt],
    policy: &PolicyConfig,
) -> EngineResult<GateDecision> {
    if let Some(live) = history.iter().find(|a| a.is_in_progress()) {
        return Ok(GateDecision::Resume(live.clone()));
    }

    if quiz.has_attempt_limit() {
        let finalized = history.iter().filter(|a| a.status.is_finalized()).count();
        if finalized >= quiz.max_attempts as usize {
            return Err(QuizError::AttemptLimitExceeded {
                max_attempts: quiz.max_attempts,
            });
        }
    }

    if policy.block_after_pass && history.iter().any(|a| a.passed == Some(true)) {
        return Err(QuizError::AlreadyPassed);
    }

    Ok(GateDecision::Create)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::fixtures::sample_quiz;
    use crate::models::AttemptStatus;
    use chrono::Utc;

    fn finalized(quiz: &Quiz, status: AttemptStatus, passed: bool) -> Attempt {
        let mut attempt = Attempt::start(quiz, "learner-1", Utc::now());
        attempt.status = status;
        attempt.score = Some(if passed { 100.0 } else { 0.0 });
        attempt.passed = Some(passed);
        attempt
    }

    #[test]
    fn live_attempt_is_resumed() {
        let quiz = sample_quiz();
        let live = Attempt::start(&quiz, "learner-1", Utc::now());
        let decision = evaluate(&quiz, &[live.clone()], &PolicyConfig::default()).unwrap();
        assert_eq!(decision, GateDecision::Resume(live));
    }

    #[test]
    fn limit_counts_graded_and_expired_attempts() {
        let mut quiz = sample_quiz();
        quiz.max_attempts = 2;
        let policy = PolicyConfig::default();

        let one = [finalized(&quiz, AttemptStatus::Graded, false)];
        assert_eq!(evaluate(&quiz, &one, &policy).unwrap(), GateDecision::Create);

        let two = [
            finalized(&quiz, AttemptStatus::Graded, false),
            finalized(&quiz, AttemptStatus::Expired, false),
        ];
        let err = evaluate(&quiz, &two, &policy).unwrap_err();
        assert!(matches!(
            err,
            QuizError::AttemptLimitExceeded { max_attempts: 2 }
        ));
    }

    #[test]
    fn non_positive_max_attempts_is_unlimited() {
        let mut quiz = sample_quiz();
        quiz.max_attempts = -1;
        let history: Vec<Attempt> = (0..10)
            .map(|_| finalized(&quiz, AttemptStatus::Graded, false))
            .collect();
        assert_eq!(
            evaluate(&quiz, &history, &PolicyConfig::default()).unwrap(),
            GateDecision::Create
        );
    }

    #[test]
    fn passing_blocks_only_when_configured() {
        let quiz = sample_quiz();
        let history = [finalized(&quiz, AttemptStatus::Graded, true)];

        assert_eq!(
            evaluate(&quiz, &history, &PolicyConfig::default()).unwrap(),
            GateDecision::Create
        );

        let strict = PolicyConfig {
            block_after_pass: true,
            ..PolicyConfig::default()
        };
        assert!(matches!(
            evaluate(&quiz, &history, &strict),
            Err(QuizError::AlreadyPassed)
        ));
    }
}
