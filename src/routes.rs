// src/routes.rs

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, auth, question},
    state::AppState,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, questions, attempts).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
///
/// Authentication happens in the `Claims`/`AdminClaims` extractors, so public
/// and protected methods can share a path (GET /questions is public while
/// POST /questions requires the admin role).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let question_routes = Router::new()
        .route(
            "/",
            get(question::list_questions).post(question::create_question),
        )
        .route("/random", get(question::random_question))
        .route(
            "/{id}",
            get(question::get_question)
                .put(question::update_question)
                .delete(question::delete_question),
        );

    let attempt_routes = Router::new()
        .route(
            "/",
            get(attempt::list_attempts).post(attempt::submit_attempt),
        )
        .route("/statistics", get(attempt::statistics))
        .route("/question/{question_id}", get(attempt::get_attempt_by_question))
        .route("/{id}", get(attempt::get_attempt));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/attempts", attempt_routes)
        .route("/api/leaderboard", get(attempt::leaderboard))
        .route("/api/check-answers", post(question::check_answers))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
