// libs/student-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn student_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/consultants/{consultant_id}", get(handlers::students_for_consultant))
        .route("/{student_id}", get(handlers::get_student))
        .route("/{student_id}", patch(handlers::update_student))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
