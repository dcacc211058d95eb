//! Attempt lifecycle: start, stage, submit, expire, and the learner reads
//! around them.
//!
//! Every operation takes the learner id explicitly. Mutations run under the
//! per-(quiz, learner) [`AttemptLock`](super::attempt_lock::AttemptLock) and
//! persist through compare-and-swap, so a lost race surfaces as
//! `AttemptNotInProgress` instead of a second write.

use std::time::Instant;

use crate::config::ExpiredGradingPolicy;
use crate::error::{EngineResult, QuizError};
use crate::metrics::{self, ATTEMPT_LOCK_WAIT_SECONDS};
use crate::models::{
    Answer, Attempt, AttemptListResponse, AttemptResult, AttemptStatus, AttemptSummary,
    LearnerQuizView, Quiz, QuizStatusSummary, StartAttemptResponse,
};
use crate::repository::InsertOutcome;
use crate::services::attempt_lock::LockGuard;
use crate::services::attempt_policy::{self, GateDecision};
use crate::services::{presentation, scoring, status_projector, AppState};
use crate::utils::time::elapsed_seconds;

pub struct AttemptService<'a> {
    state: &'a AppState,
}

impl<'a> AttemptService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Learner view of a quiz. Uses the live attempt's ordering when there is one.
    pub async fn get_quiz_for_attempt(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<LearnerQuizView> {
        let quiz = self.load_quiz(quiz_id).await?;
        self.learner_view(quiz, learner_id).await
    }

    pub async fn get_quiz_for_lesson(
        &self,
        lesson_id: &str,
        learner_id: &str,
    ) -> EngineResult<LearnerQuizView> {
        let quiz = self
            .state
            .quizzes
            .find_by_lesson(lesson_id)
            .await?
            .ok_or_else(|| QuizError::QuizNotFound(format!("lesson {}", lesson_id)))?;
        self.learner_view(quiz, learner_id).await
    }

    async fn learner_view(&self, quiz: Quiz, learner_id: &str) -> EngineResult<LearnerQuizView> {
        self.ensure_enrolled(&quiz, learner_id).await?;
        let history = self.history(&quiz, learner_id).await?;
        let live = history.iter().find(|a| a.is_in_progress());
        Ok(presentation::learner_view(&quiz, live))
    }

    pub async fn get_status(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<QuizStatusSummary> {
        let quiz = self.load_quiz(quiz_id).await?;
        let history = self.history(&quiz, learner_id).await?;
        Ok(status_projector::project(
            &quiz,
            &history,
            &self.state.config.policy,
        ))
    }

    pub async fn list_attempts(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<AttemptListResponse> {
        let quiz = self.load_quiz(quiz_id).await?;
        let attempts: Vec<AttemptSummary> = self
            .history(&quiz, learner_id)
            .await?
            .iter()
            .map(Attempt::summary)
            .collect();
        Ok(AttemptListResponse {
            total: attempts.len(),
            attempts,
        })
    }

    /// Starts a new attempt, or hands back the live one (`resumed = true`).
    pub async fn start(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<StartAttemptResponse> {
        self.start_inner(quiz_id, learner_id)
            .await
            .inspect_err(|e| reject("start", e))
    }

    async fn start_inner(
        &self,
        quiz_id: &str,
        learner_id: &str,
    ) -> EngineResult<StartAttemptResponse> {
        let quiz = self.load_quiz(quiz_id).await?;
        self.ensure_enrolled(&quiz, learner_id).await?;

        let _guard = self.lock(&quiz.id, learner_id).await?;
        let history = self.history(&quiz, learner_id).await?;

        let (attempt, resumed) = match attempt_policy::evaluate(
            &quiz,
            &history,
            &self.state.config.policy,
        )? {
            GateDecision::Resume(live) => (live, true),
            GateDecision::Create => {
                quiz.ensure_attemptable()?;
                let fresh = Attempt::start(&quiz, learner_id, self.state.clock.now());
                match self.state.attempts.insert_attempt(&fresh).await? {
                    InsertOutcome::Created(created) => (created, false),
                    InsertOutcome::Existing(existing) => (existing, true),
                }
            }
        };

        metrics::record_attempt_started(resumed);
        if resumed {
            tracing::info!(
                "Resumed attempt {} for learner {} on quiz {}",
                attempt.id,
                learner_id,
                quiz.id
            );
        } else {
            tracing::info!(
                "Started attempt {} for learner {} on quiz {} (expires_at={:?})",
                attempt.id,
                learner_id,
                quiz.id,
                attempt.expires_at
            );
        }

        Ok(StartAttemptResponse {
            quiz: presentation::learner_view(&quiz, Some(&attempt)),
            attempt: attempt.summary(),
            resumed,
        })
    }

    /// Replaces the staged answers of a live attempt.
    pub async fn stage_answers(
        &self,
        attempt_id: &str,
        learner_id: &str,
        answers: Vec<Answer>,
    ) -> EngineResult<AttemptSummary> {
        self.stage_inner(attempt_id, learner_id, answers)
            .await
            .inspect_err(|e| reject("stage", e))
    }

    async fn stage_inner(
        &self,
        attempt_id: &str,
        learner_id: &str,
        answers: Vec<Answer>,
    ) -> EngineResult<AttemptSummary> {
        let attempt = self.load_owned_attempt(attempt_id, learner_id).await?;
        let quiz = self.load_quiz(&attempt.quiz_id).await?;
        scoring::validate_answers(&quiz, &answers)?;

        let _guard = self.lock(&quiz.id, learner_id).await?;
        let current = self.live_attempt(&quiz, attempt_id).await?;

        let expected_revision = current.revision;
        let mut staged = current;
        staged.staged_answers = answers;
        staged.revision = expected_revision + 1;

        self.write(&staged, AttemptStatus::InProgress, expected_revision)
            .await?;
        tracing::debug!(
            "Staged {} answers on attempt {}",
            staged.staged_answers.len(),
            staged.id
        );
        Ok(staged.summary())
    }

    /// Submits and grades in one step. Returns the learner copy of the result.
    pub async fn submit(
        &self,
        attempt_id: &str,
        learner_id: &str,
        answers: Vec<Answer>,
    ) -> EngineResult<AttemptResult> {
        self.submit_inner(attempt_id, learner_id, answers)
            .await
            .inspect_err(|e| reject("submit", e))
    }

    async fn submit_inner(
        &self,
        attempt_id: &str,
        learner_id: &str,
        answers: Vec<Answer>,
    ) -> EngineResult<AttemptResult> {
        let attempt = self.load_owned_attempt(attempt_id, learner_id).await?;
        let quiz = self.load_quiz(&attempt.quiz_id).await?;

        let _guard = self.lock(&quiz.id, learner_id).await?;
        let current = self.live_attempt(&quiz, attempt_id).await?;
        scoring::validate_answers(&quiz, &answers)?;

        let now = self.state.clock.now();
        let expected_revision = current.revision;
        let mut graded = current;
        graded.transition(AttemptStatus::Submitted)?;

        let grade = scoring::grade(&quiz, &answers);
        let time_spent = elapsed_seconds(graded.started_at, now);
        graded.transition(AttemptStatus::Graded)?;
        graded.completed_at = Some(now);
        graded.time_spent_seconds = Some(time_spent);
        graded.score = Some(grade.score_percentage);
        graded.passed = Some(grade.passed);
        graded.staged_answers = answers;
        graded.result = Some(AttemptResult {
            attempt_id: graded.id.clone(),
            quiz_id: quiz.id.clone(),
            status: AttemptStatus::Graded,
            time_spent_seconds: time_spent,
            grade,
        });
        graded.revision = expected_revision + 1;

        self.write(&graded, AttemptStatus::InProgress, expected_revision)
            .await?;

        let result = graded
            .result
            .as_ref()
            .ok_or_else(|| QuizError::NotGraded(graded.id.clone()))?;
        metrics::record_attempt_finalized(
            AttemptStatus::Graded,
            result.grade.passed,
            result.grade.score_percentage,
        );
        tracing::info!(
            "Graded attempt {} for learner {}: {}/{} points ({}%), passed={}",
            graded.id,
            learner_id,
            result.grade.earned_points,
            result.grade.total_points,
            result.grade.score_percentage,
            result.grade.passed
        );

        Ok(result.for_learner(quiz.show_correct_answers))
    }

    /// Stored result of a graded or expired attempt.
    pub async fn get_result(
        &self,
        attempt_id: &str,
        learner_id: &str,
    ) -> EngineResult<AttemptResult> {
        let attempt = self.load_owned_attempt(attempt_id, learner_id).await?;
        let quiz = self.load_quiz(&attempt.quiz_id).await?;
        let attempt = self.expire_if_overdue(&quiz, attempt).await?;

        attempt
            .result
            .as_ref()
            .map(|result| result.for_learner(quiz.show_correct_answers))
            .ok_or(QuizError::NotGraded(attempt.id))
    }

    /// Moves an overdue attempt to `expired` and grades it per policy. Anything
    /// else is returned unchanged.
    pub async fn expire_if_overdue(&self, quiz: &Quiz, attempt: Attempt) -> EngineResult<Attempt> {
        if !attempt.is_overdue(self.state.clock.now()) {
            return Ok(attempt);
        }
        let Some(deadline) = attempt.expires_at else {
            return Ok(attempt);
        };

        let expected_revision = attempt.revision;
        let mut expired = attempt;
        expired.transition(AttemptStatus::Expired)?;

        let mut grade = match self.state.config.policy.expired_grading {
            ExpiredGradingPolicy::GradeStaged => scoring::grade(quiz, &expired.staged_answers),
            ExpiredGradingPolicy::ZeroScore => scoring::grade(quiz, &[]),
        };
        if self.state.config.policy.expired_grading == ExpiredGradingPolicy::ZeroScore
            || expired.staged_answers.is_empty()
        {
            grade.passed = false;
        }

        let time_spent = elapsed_seconds(expired.started_at, deadline);
        expired.completed_at = Some(deadline);
        expired.time_spent_seconds = Some(time_spent);
        expired.score = Some(grade.score_percentage);
        expired.passed = Some(grade.passed);
        expired.result = Some(AttemptResult {
            attempt_id: expired.id.clone(),
            quiz_id: quiz.id.clone(),
            status: AttemptStatus::Expired,
            time_spent_seconds: time_spent,
            grade,
        });
        expired.revision = expected_revision + 1;

        let written = self
            .state
            .attempts
            .update_if(&expired, AttemptStatus::InProgress, expected_revision)
            .await?;

        if written {
            metrics::record_attempt_finalized(
                AttemptStatus::Expired,
                expired.passed.unwrap_or(false),
                expired.score.unwrap_or(0.0),
            );
            tracing::info!(
                "Attempt {} expired at {} (policy {:?})",
                expired.id,
                deadline,
                self.state.config.policy.expired_grading
            );
            return Ok(expired);
        }

        // Someone else finalized it first; theirs wins.
        self.state
            .attempts
            .find_attempt(&expired.id)
            .await?
            .ok_or_else(|| QuizError::AttemptNotFound(expired.id.clone()))
    }

    /// Learner history with overdue attempts expired, newest first.
    async fn history(&self, quiz: &Quiz, learner_id: &str) -> EngineResult<Vec<Attempt>> {
        let stored = self
            .state
            .attempts
            .list_for_learner(&quiz.id, learner_id)
            .await?;
        let mut history = Vec::with_capacity(stored.len());
        for attempt in stored {
            history.push(self.expire_if_overdue(quiz, attempt).await?);
        }
        Ok(history)
    }

    async fn load_quiz(&self, quiz_id: &str) -> EngineResult<Quiz> {
        self.state
            .quizzes
            .find_by_id(quiz_id)
            .await?
            .ok_or_else(|| QuizError::QuizNotFound(quiz_id.to_string()))
    }

    async fn load_owned_attempt(
        &self,
        attempt_id: &str,
        learner_id: &str,
    ) -> EngineResult<Attempt> {
        let attempt = self
            .state
            .attempts
            .find_attempt(attempt_id)
            .await?
            .ok_or_else(|| QuizError::AttemptNotFound(attempt_id.to_string()))?;

        if attempt.learner_id != learner_id {
            tracing::warn!(
                "Learner {} tried to access attempt {} owned by {}",
                learner_id,
                attempt_id,
                attempt.learner_id
            );
            return Err(QuizError::Forbidden(format!(
                "attempt {} belongs to another learner",
                attempt_id
            )));
        }
        Ok(attempt)
    }

    /// Re-reads the attempt under the lock and insists it is still live.
    async fn live_attempt(&self, quiz: &Quiz, attempt_id: &str) -> EngineResult<Attempt> {
        let attempt = self
            .state
            .attempts
            .find_attempt(attempt_id)
            .await?
            .ok_or_else(|| QuizError::AttemptNotFound(attempt_id.to_string()))?;
        let attempt = self.expire_if_overdue(quiz, attempt).await?;
        attempt.ensure_in_progress()?;
        Ok(attempt)
    }

    async fn write(
        &self,
        attempt: &Attempt,
        expected_status: AttemptStatus,
        expected_revision: i64,
    ) -> EngineResult<()> {
        if self
            .state
            .attempts
            .update_if(attempt, expected_status, expected_revision)
            .await?
        {
            return Ok(());
        }

        let status = self
            .state
            .attempts
            .find_attempt(&attempt.id)
            .await?
            .map(|stored| stored.status)
            .ok_or_else(|| QuizError::AttemptNotFound(attempt.id.clone()))?;
        tracing::warn!("Lost write race on attempt {} (now {})", attempt.id, status);
        Err(QuizError::AttemptNotInProgress {
            id: attempt.id.clone(),
            status,
        })
    }

    async fn ensure_enrolled(&self, quiz: &Quiz, learner_id: &str) -> EngineResult<()> {
        if self
            .state
            .enrollment
            .is_enrolled(learner_id, &quiz.lesson_id)
            .await?
        {
            return Ok(());
        }
        tracing::warn!(
            "Learner {} is not enrolled in lesson {}",
            learner_id,
            quiz.lesson_id
        );
        Err(QuizError::Forbidden(format!(
            "not enrolled in lesson {}",
            quiz.lesson_id
        )))
    }

    async fn lock(&self, quiz_id: &str, learner_id: &str) -> EngineResult<LockGuard> {
        let started = Instant::now();
        let guard = self.state.locks.acquire(quiz_id, learner_id).await;
        ATTEMPT_LOCK_WAIT_SECONDS.observe(started.elapsed().as_secs_f64());
        guard
    }
}

fn reject(operation: &str, err: &QuizError) {
    metrics::record_rejection(operation, err.code());
}
