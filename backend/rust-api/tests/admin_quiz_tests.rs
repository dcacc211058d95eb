use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use common::{instructor_token, learner_token, TestApp};

async fn create_quiz(app: &TestApp, lesson_id: &str) -> Value {
    let (status, quiz) = app
        .post(
            &format!("/admin/lessons/{}/quiz", lesson_id),
            &instructor_token(),
            json!({
                "title": "Traits and generics",
                "description": "Checkpoint quiz",
                "passing_score": 50,
                "max_attempts": 3
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", quiz);
    quiz
}

async fn add_question(app: &TestApp, quiz_id: &str, body: Value) -> (StatusCode, Value) {
    app.post(
        &format!("/admin/quizzes/{}/questions", quiz_id),
        &instructor_token(),
        body,
    )
    .await
}

fn single_choice(prompt: &str) -> Value {
    json!({
        "kind": "single_choice",
        "prompt": prompt,
        "points": 2,
        "required": true,
        "options": [
            { "text": "Yes", "is_correct": true },
            { "text": "No" }
        ]
    })
}

#[tokio::test]
async fn test_create_quiz_applies_defaults_and_rejects_duplicates() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-a").await;
    assert_eq!(quiz["lesson_id"], "lesson-a");
    assert_eq!(quiz["passing_score"], 50);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 0);

    let (status, err) = app
        .post(
            "/admin/lessons/lesson-a/quiz",
            &instructor_token(),
            json!({ "title": "Second quiz" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "conflict");

    let (status, defaulted) = app
        .post(
            "/admin/lessons/lesson-b/quiz",
            &instructor_token(),
            json!({ "title": "Defaults" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(defaulted["passing_score"], 70);
    assert_eq!(defaulted["max_attempts"], 0);
}

#[tokio::test]
async fn test_create_quiz_validates_input() {
    let app = TestApp::new();
    let (status, err) = app
        .post(
            "/admin/lessons/lesson-a/quiz",
            &instructor_token(),
            json!({ "title": "", "passing_score": 150 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn test_learners_cannot_author() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/admin/lessons/lesson-a/quiz",
            &learner_token("learner-1"),
            json!({ "title": "Sneaky" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request("GET", "/admin/lessons/lesson-a/quiz", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_questions_and_reveal_to_authors_only() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-q").await;
    let quiz_id = quiz["id"].as_str().unwrap();

    let (status, first) = add_question(&app, quiz_id, single_choice("Is Send auto?")).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", first);
    assert_eq!(first["order_index"], 0);
    assert_eq!(first["options"][0]["is_correct"], true);

    let (status, second) = add_question(
        &app,
        quiz_id,
        json!({
            "kind": "free_text",
            "prompt": "Name the trait behind `?` conversions",
            "expected_answer": "From"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", second);
    assert_eq!(second["order_index"], 1);
    assert_eq!(second["points"], 1);

    let (status, full) = app
        .get("/admin/lessons/lesson-q/quiz", &instructor_token())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(full["questions"].as_array().unwrap().len(), 2);
    assert!(full.to_string().contains("is_correct"));

    let (status, learner_view) = app
        .get(&format!("/api/v1/quizzes/{}", quiz_id), &learner_token("learner-1"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(learner_view["total_points"], 3);
    assert!(!learner_view.to_string().contains("is_correct"));
    assert!(!learner_view.to_string().contains("expected_answer"));
}

#[tokio::test]
async fn test_invalid_questions_are_rejected() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-bad").await;
    let quiz_id = quiz["id"].as_str().unwrap();

    let (status, err) = add_question(
        &app,
        quiz_id,
        json!({
            "kind": "single_choice",
            "prompt": "Two right answers?",
            "options": [
                { "text": "A", "is_correct": true },
                { "text": "B", "is_correct": true }
            ]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "validation_error");

    let (status, _) = add_question(
        &app,
        quiz_id,
        json!({
            "kind": "free_text",
            "prompt": "Options on free text",
            "options": [{ "text": "A", "is_correct": true }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = add_question(&app, "missing", single_choice("Orphan")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stored) = app
        .get(&format!("/admin/quizzes/{}", quiz_id), &instructor_token())
        .await;
    assert_eq!(stored["questions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_update_question_replaces_options() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-upd").await;
    let quiz_id = quiz["id"].as_str().unwrap();
    let (_, question) = add_question(&app, quiz_id, single_choice("Pick one")).await;
    let question_id = question["id"].as_str().unwrap();
    let uri = format!("/admin/quizzes/{}/questions/{}", quiz_id, question_id);

    let (status, updated) = app
        .request(
            "PATCH",
            &uri,
            Some(&instructor_token()),
            Some(json!({
                "kind": "multi_choice",
                "points": 4,
                "options": [
                    { "text": "Arc", "is_correct": true },
                    { "text": "Rc" },
                    { "text": "Mutex", "is_correct": true }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {}", updated);
    assert_eq!(updated["kind"], "multi_choice");
    assert_eq!(updated["points"], 4);
    assert_eq!(updated["options"].as_array().unwrap().len(), 3);

    // Back to single choice while two options are correct.
    let (status, _) = app
        .request(
            "PATCH",
            &uri,
            Some(&instructor_token()),
            Some(json!({ "kind": "single_choice" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, stored) = app
        .get(&format!("/admin/quizzes/{}", quiz_id), &instructor_token())
        .await;
    assert_eq!(stored["questions"][0]["kind"], "multi_choice");

    let (status, _) = app
        .request(
            "PATCH",
            &format!("/admin/quizzes/{}/questions/nope", quiz_id),
            Some(&instructor_token()),
            Some(json!({ "points": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reorder_requires_full_permutation() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-order").await;
    let quiz_id = quiz["id"].as_str().unwrap();

    let mut ids = Vec::new();
    for prompt in ["First", "Second", "Third"] {
        let (_, question) = add_question(&app, quiz_id, single_choice(prompt)).await;
        ids.push(question["id"].as_str().unwrap().to_string());
    }
    let uri = format!("/admin/quizzes/{}/order", quiz_id);

    let (status, reordered) = app
        .request(
            "PUT",
            &uri,
            Some(&instructor_token()),
            Some(json!({ "question_ids": [ids[2], ids[0], ids[1]] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "body: {}", reordered);

    let (_, view) = app
        .get(&format!("/api/v1/quizzes/{}", quiz_id), &learner_token("learner-1"))
        .await;
    assert_eq!(view["questions"][0]["prompt"], "Third");
    assert_eq!(view["questions"][1]["prompt"], "First");
    assert_eq!(view["questions"][2]["prompt"], "Second");

    for bad in [
        json!({ "question_ids": [ids[0], ids[1]] }),
        json!({ "question_ids": [ids[0], ids[0], ids[1]] }),
        json!({ "question_ids": [ids[0], ids[1], "stranger"] }),
        json!({ "question_ids": [] }),
    ] {
        let (status, err) = app
            .request("PUT", &uri, Some(&instructor_token()), Some(bad))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "validation_error");
    }
}

#[tokio::test]
async fn test_update_quiz_settings() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-settings").await;
    let uri = format!("/admin/quizzes/{}", quiz["id"].as_str().unwrap());

    let (status, updated) = app
        .request(
            "PATCH",
            &uri,
            Some(&instructor_token()),
            Some(json!({ "time_limit_seconds": 300, "show_correct_answers": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["time_limit_seconds"], 300);
    assert_eq!(updated["show_correct_answers"], true);
    assert_eq!(updated["title"], "Traits and generics");

    let (status, _) = app
        .request(
            "PATCH",
            &uri,
            Some(&instructor_token()),
            Some(json!({ "passing_score": 101 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_question_and_quiz_cascade() {
    let app = TestApp::new();
    let quiz = create_quiz(&app, "lesson-del").await;
    let quiz_id = quiz["id"].as_str().unwrap().to_string();
    let (_, keep) = add_question(&app, &quiz_id, single_choice("Keep")).await;
    let (_, dropped) = add_question(&app, &quiz_id, single_choice("Drop")).await;

    let (status, _) = app
        .request(
            "DELETE",
            &format!(
                "/admin/quizzes/{}/questions/{}",
                quiz_id,
                dropped["id"].as_str().unwrap()
            ),
            Some(&instructor_token()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, stored) = app
        .get(&format!("/admin/quizzes/{}", quiz_id), &instructor_token())
        .await;
    assert_eq!(stored["questions"].as_array().unwrap().len(), 1);
    assert_eq!(stored["questions"][0]["id"], keep["id"]);

    let learner = learner_token("learner-1");
    let (status, started) = app
        .post(&format!("/api/v1/quizzes/{}/start", quiz_id), &learner, json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let attempt_id = started["attempt"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/admin/quizzes/{}", quiz_id),
            Some(&instructor_token()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(app
        .state
        .attempts
        .find_attempt(&attempt_id)
        .await
        .unwrap()
        .is_none());

    let (status, _) = app
        .get(&format!("/api/v1/quizzes/{}", quiz_id), &learner)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            "DELETE",
            &format!("/admin/quizzes/{}", quiz_id),
            Some(&instructor_token()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
