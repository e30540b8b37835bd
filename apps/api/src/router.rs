use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, SchedulingState};
use doctor_cell::doctor_routes;

pub fn create_router(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(Arc::clone(&state.config), Arc::clone(&state.availability)))
        .nest("/appointments", appointment_routes(state))
}
