// libs/consultant-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultant_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Market listing management
        .route("/listings", post(handlers::create_listing))
        .route("/listings/{listing_id}", patch(handlers::update_listing))
        .route("/listings/{listing_id}/toggle", post(handlers::toggle_listing))

        // Verification workflow
        .route("/verifications", post(handlers::submit_verification))
        .route("/verifications/mine", get(handlers::my_verifications))
        .route("/verifications/pending", get(handlers::pending_verifications))
        .route("/verifications/{verification_id}/review", post(handlers::review_verification))

        // Public-facing consultant data
        .route("/{consultant_id}", get(handlers::get_consultant))
        .route("/{consultant_id}/listing", get(handlers::get_active_listing))
        .route("/{consultant_id}/slots", get(handlers::list_available_slots))
        .route("/{consultant_id}/unavailable-dates", get(handlers::unavailable_dates))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
