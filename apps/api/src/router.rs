use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use consultant_cell::router::consultant_routes;
use shared_config::AppConfig;
use student_cell::router::student_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Consultation booking API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/consultants", consultant_routes(state.clone()))
        .nest("/students", student_routes(state))
}
