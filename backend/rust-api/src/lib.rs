use axum::{
    http::{header, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EngineResult, QuizError};
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest(
            "/api/v1",
            learner_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/admin",
            authoring_routes()
                .route_layer(middleware::from_fn(
                    middlewares::auth::instructor_guard_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::auth_middleware,
                )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn learner_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quizzes/{quiz_id}", get(handlers::quizzes::get_quiz))
        .route(
            "/lessons/{lesson_id}/quiz",
            get(handlers::quizzes::get_lesson_quiz),
        )
        .route(
            "/quizzes/{quiz_id}/status",
            get(handlers::quizzes::get_status),
        )
        .route(
            "/quizzes/{quiz_id}/start",
            post(handlers::quizzes::start_attempt),
        )
        .route(
            "/quizzes/{quiz_id}/attempts",
            get(handlers::quizzes::list_attempts),
        )
        .route(
            "/attempts/{attempt_id}/answers",
            put(handlers::quizzes::stage_answers),
        )
        .route(
            "/attempts/{attempt_id}/submit",
            post(handlers::quizzes::submit_attempt),
        )
        .route(
            "/attempts/{attempt_id}/result",
            get(handlers::quizzes::get_result),
        )
}

fn authoring_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/lessons/{lesson_id}/quiz",
            get(handlers::authoring::get_lesson_quiz).post(handlers::authoring::create_quiz),
        )
        .route(
            "/quizzes/{quiz_id}",
            get(handlers::authoring::get_quiz)
                .patch(handlers::authoring::update_quiz)
                .delete(handlers::authoring::delete_quiz),
        )
        .route(
            "/quizzes/{quiz_id}/questions",
            post(handlers::authoring::add_question),
        )
        .route(
            "/quizzes/{quiz_id}/questions/{question_id}",
            patch(handlers::authoring::update_question)
                .delete(handlers::authoring::delete_question),
        )
        .route(
            "/quizzes/{quiz_id}/order",
            put(handlers::authoring::reorder_questions),
        )
}
