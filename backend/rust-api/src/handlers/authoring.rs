//! Quiz authoring for instructors and admins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::{
    extractors::AppJson,
    middlewares::auth::AuthenticatedUser,
    models::quiz::{
        CreateQuestionRequest, CreateQuizRequest, ReorderQuestionsRequest, UpdateQuestionRequest,
        UpdateQuizRequest,
    },
    services::{quiz_admin_service::QuizAdminService, AppState},
};

pub async fn create_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(lesson_id): Path<String>,
    AppJson(req): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("{} creating quiz for lesson {}", user.id, lesson_id);
    let quiz = QuizAdminService::new(&state)
        .create_quiz(&lesson_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn get_lesson_quiz(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = QuizAdminService::new(&state)
        .get_quiz_by_lesson(&lesson_id)
        .await?;
    Ok(Json(quiz))
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = QuizAdminService::new(&state).get_quiz(&quiz_id).await?;
    Ok(Json(quiz))
}

pub async fn update_quiz(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<UpdateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = QuizAdminService::new(&state)
        .update_quiz(&quiz_id, req)
        .await?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("{} deleting quiz {}", user.id, quiz_id);
    QuizAdminService::new(&state).delete_quiz(&quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_question(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = QuizAdminService::new(&state)
        .add_question(&quiz_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path((quiz_id, question_id)): Path<(String, String)>,
    AppJson(req): AppJson<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = QuizAdminService::new(&state)
        .update_question(&quiz_id, &question_id, req)
        .await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path((quiz_id, question_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    QuizAdminService::new(&state)
        .delete_question(&quiz_id, &question_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder_questions(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    AppJson(req): AppJson<ReorderQuestionsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let quiz = QuizAdminService::new(&state)
        .reorder_questions(&quiz_id, req)
        .await?;
    Ok(Json(quiz))
}
