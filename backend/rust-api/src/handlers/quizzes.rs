//! Learner endpoints. The learner is always the authenticated caller.

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
    models::{StageAnswersRequest, SubmitAttemptRequest},
    services::{attempt_service::AttemptService, AppState},
};

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = AttemptService::new(&state)
        .get_quiz_for_attempt(&quiz_id, &user.id)
        .await?;
    Ok(Json(view))
}

pub async fn get_lesson_quiz(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = AttemptService::new(&state)
        .get_quiz_for_lesson(&lesson_id, &user.id)
        .await?;
    Ok(Json(view))
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = AttemptService::new(&state)
        .get_status(&quiz_id, &user.id)
        .await?;
    Ok(Json(summary))
}

/// 201 for a new attempt, 200 when the live one is resumed.
pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Start requested: learner={}, quiz={}", user.id, quiz_id);

    let response = AttemptService::new(&state).start(&quiz_id, &user.id).await?;
    let status = if response.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

pub async fn list_attempts(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let attempts = AttemptService::new(&state)
        .list_attempts(&quiz_id, &user.id)
        .await?;
    Ok(Json(attempts))
}

pub async fn stage_answers(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<StageAnswersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = AttemptService::new(&state)
        .stage_answers(&attempt_id, &user.id, req.answers)
        .await?;
    Ok(Json(summary))
}

pub async fn submit_attempt(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Submitting attempt {} for learner {} ({} answers)",
        attempt_id,
        user.id,
        req.answers.len()
    );

    let result = AttemptService::new(&state)
        .submit(&attempt_id, &user.id, req.answers)
        .await?;
    Ok(Json(result))
}

pub async fn get_result(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = AttemptService::new(&state)
        .get_result(&attempt_id, &user.id)
        .await?;
    Ok(Json(result))
}
