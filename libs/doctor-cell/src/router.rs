// libs/doctor-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::availability::AvailabilityService;

pub fn doctor_routes(config: Arc<AppConfig>, availability: Arc<AvailabilityService>) -> Router {
    Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_weekly_availability))
        .route("/{doctor_id}/availability/{day}", put(handlers::set_day_availability))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(availability)
}
