// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        // Core booking and lifecycle
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .route("/{appointment_id}/feedback", post(handlers::submit_feedback))

        // Per-role appointment listings (pure reads; no sweep side effects)
        .route("/students/{student_id}", get(handlers::student_appointments))
        .route("/consultants/{consultant_id}", get(handlers::consultant_appointments))

        // Explicit maintenance operations
        .route("/maintenance/lapse", post(handlers::run_lapse_sweep))
        .route("/maintenance/reconcile-sessions", post(handlers::reconcile_sessions))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
