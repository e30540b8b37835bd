// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::transition_appointment))
        .route("/doctors/{doctor_id}/free-slots", get(handlers::free_slots))
        .route("/doctors/{doctor_id}/schedule", get(handlers::doctor_schedule))
        .layer(middleware::from_fn_with_state(Arc::clone(&state.config), auth_middleware))
        .with_state(state)
}
