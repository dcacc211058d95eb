use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// `Json` that rejects malformed bodies with 400 and the engine's error body,
/// `{"error": "invalid_json", "message", "status"}`, instead of axum's plain
/// text (and 422 for shape mismatches). Answer payloads that parse but do not
/// fit the quiz are rejected later as `validation_error`.
pub struct AppJson<T>(pub T);

fn invalid_json(rejection: JsonRejection) -> Response {
    let message = format!("Failed to parse JSON request body: {}", rejection.body_text());
    tracing::warn!("{}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_json",
            "message": message,
            "status": StatusCode::BAD_REQUEST.as_u16(),
        })),
    )
        .into_response()
}

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| AppJson(value))
            .map_err(invalid_json)
    }
}
