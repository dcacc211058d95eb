use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::QuizError;
use crate::metrics;
use crate::services::AppState;

pub mod authoring;
pub mod quizzes;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage = check_dependency("Storage", Duration::from_secs(1), async {
        state.quizzes.ping().await?;
        state.attempts.ping().await
    })
    .await;
    let locks = check_dependency("Lock backend", Duration::from_millis(500), async {
        state.locks.ping().await
    })
    .await;

    let all_healthy = [&storage, &locks]
        .iter()
        .all(|dep| dep.get("status").and_then(|v| v.as_str()) == Some("healthy"));

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if all_healthy { "healthy" } else { "degraded" },
            "service": "quizengine-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "storage": storage,
                "locks": locks,
            }
        })),
    )
}

async fn check_dependency<F>(
    name: &str,
    timeout: Duration,
    probe: F,
) -> serde_json::Map<String, serde_json::Value>
where
    F: Future<Output = Result<(), QuizError>>,
{
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert("message".to_string(), json!(format!("{} reachable", name)));
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(format!("{} error: {}", name, e)));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert(
                "error".to_string(),
                json!(format!("{} timeout after {:?}", name, timeout)),
            );
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics`; credentials come from `metrics.auth`.
pub async fn metrics_auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    if credentials != state.config.metrics_auth {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Engine(QuizError),
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        ApiError::Engine(err)
    }
}

fn engine_status(err: &QuizError) -> StatusCode {
    match err {
        QuizError::Validation(_) => StatusCode::BAD_REQUEST,
        QuizError::QuizNotFound(_)
        | QuizError::QuestionNotFound(_)
        | QuizError::AttemptNotFound(_) => StatusCode::NOT_FOUND,
        QuizError::Forbidden(_)
        | QuizError::AttemptLimitExceeded { .. }
        | QuizError::AlreadyPassed => StatusCode::FORBIDDEN,
        QuizError::QuizNotAttemptable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QuizError::AttemptNotInProgress { .. }
        | QuizError::NotGraded(_)
        | QuizError::Conflict(_) => StatusCode::CONFLICT,
        QuizError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        QuizError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            ApiError::Engine(err) => {
                let status = engine_status(&err);
                let message = match &err {
                    QuizError::Storage(source) => {
                        tracing::error!("Storage failure: {:#}", source);
                        "internal storage error".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
        };

        (
            status,
            Json(json!({
                "error": code,
                "message": message,
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}
