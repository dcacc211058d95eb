#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use quizengine_api::{
    config::{Config, LockConfig, PolicyConfig},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::{Question, QuestionKind, Quiz, QuizOption},
    repository::{InMemoryAttemptRepository, InMemoryQuizRepository},
    services::{attempt_lock::LocalAttemptLock, enrollment::EnrollmentChecker, AppState},
    utils::time::ManualClock,
    EngineResult,
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const METRICS_AUTH: &str = "metrics:secret";

/// Admits everyone except explicitly denied (learner, lesson) pairs.
#[derive(Default)]
pub struct FakeEnrollment {
    denied: Mutex<HashSet<(String, String)>>,
}

impl FakeEnrollment {
    pub fn deny(&self, learner_id: &str, lesson_id: &str) {
        self.denied
            .lock()
            .unwrap()
            .insert((learner_id.to_string(), lesson_id.to_string()));
    }
}

#[async_trait]
impl EnrollmentChecker for FakeEnrollment {
    async fn is_enrolled(&self, learner_id: &str, lesson_id: &str) -> EngineResult<bool> {
        Ok(!self
            .denied
            .lock()
            .unwrap()
            .contains(&(learner_id.to_string(), lesson_id.to_string())))
    }
}

pub fn test_config(policy: PolicyConfig) -> Config {
    Config {
        mongo_uri: "mongodb://unused".to_string(),
        redis_uri: "redis://unused".to_string(),
        mongo_database: "quizengine_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        enrollment_api_url: None,
        bind_addr: "127.0.0.1:0".to_string(),
        metrics_auth: METRICS_AUTH.to_string(),
        policy,
        lock: LockConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub enrollment: Arc<FakeEnrollment>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(PolicyConfig::default())
    }

    pub fn with_policy(policy: PolicyConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let enrollment = Arc::new(FakeEnrollment::default());
        let state = Arc::new(AppState::from_parts(
            test_config(policy),
            Arc::new(InMemoryQuizRepository::new()),
            Arc::new(InMemoryAttemptRepository::new()),
            Arc::new(LocalAttemptLock::new(Duration::from_secs(2))),
            enrollment.clone(),
            clock.clone(),
        ));

        Self {
            router: create_router(state.clone()),
            state,
            clock,
            enrollment,
        }
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    pub async fn seed(&self, quiz: &Quiz) {
        self.state.quizzes.insert(quiz).await.unwrap();
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }
}

pub fn token_for(user_id: &str, role: &str) -> String {
    let now = Utc::now().timestamp();
    JwtService::new(JWT_SECRET)
        .generate_token(&JwtClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
        })
        .unwrap()
}

pub fn learner_token(learner_id: &str) -> String {
    token_for(learner_id, "learner")
}

pub fn instructor_token() -> String {
    token_for("instructor-1", "instructor")
}

fn option(question_id: &str, id: &str, is_correct: bool, order_index: u32) -> QuizOption {
    QuizOption {
        id: id.to_string(),
        question_id: question_id.to_string(),
        text: format!("Option {}", id),
        is_correct,
        order_index,
    }
}

/// Two 5-point questions: single choice (correct `B`) and multi choice
/// (correct `X` and `Y`). Passing score 60.
pub fn sample_quiz(lesson_id: &str) -> Quiz {
    let quiz_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    Quiz {
        id: quiz_id.clone(),
        lesson_id: lesson_id.to_string(),
        title: "Ownership basics".to_string(),
        description: "Moves, borrows and lifetimes".to_string(),
        time_limit_seconds: 0,
        passing_score: 60,
        max_attempts: 0,
        shuffle_questions: false,
        shuffle_options: false,
        show_correct_answers: true,
        questions: vec![
            Question {
                id: "q1".to_string(),
                quiz_id: quiz_id.clone(),
                kind: QuestionKind::SingleChoice,
                prompt: "Which keyword moves a closure's captures?".to_string(),
                explanation: Some("`move` transfers ownership.".to_string()),
                points: 5,
                required: true,
                order_index: 0,
                options: vec![
                    option("q1", "A", false, 0),
                    option("q1", "B", true, 1),
                    option("q1", "C", false, 2),
                ],
                expected_answer: None,
            },
            Question {
                id: "q2".to_string(),
                quiz_id,
                kind: QuestionKind::MultiChoice,
                prompt: "Which types are Copy?".to_string(),
                explanation: None,
                points: 5,
                required: true,
                order_index: 1,
                options: vec![
                    option("q2", "X", true, 0),
                    option("q2", "Y", true, 1),
                    option("q2", "Z", false, 2),
                ],
                expected_answer: None,
            },
        ],
        created_at: now,
        updated_at: now,
    }
}

pub fn answers(q1: &[&str], q2: &[&str]) -> Value {
    serde_json::json!({
        "answers": [
            { "question_id": "q1", "selected_option_ids": q1 },
            { "question_id": "q2", "selected_option_ids": q2 },
        ]
    })
}
