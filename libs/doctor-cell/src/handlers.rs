// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{State, Extension},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::{ApiJson, ApiPath};

use crate::models::{AvailabilityError, DayOfWeek, UpsertAvailabilityRequest};
use crate::services::availability::AvailabilityService;

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidHours { .. } => AppError::ValidationError(err.to_string()),
            AvailabilityError::DuplicateDay(_) => AppError::Database(err.to_string()),
            AvailabilityError::Storage(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn get_weekly_availability(
    State(service): State<Arc<AvailabilityService>>,
    ApiPath(doctor_id): ApiPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let template = service.get_weekly_template(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "availability": template.days,
    })))
}

/// Doctors maintain their own hours; admins may maintain anyone's.
#[axum::debug_handler]
pub async fn set_day_availability(
    State(service): State<Arc<AvailabilityService>>,
    Extension(user): Extension<User>,
    ApiPath((doctor_id, day)): ApiPath<(Uuid, DayOfWeek)>,
    ApiJson(request): ApiJson<UpsertAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let is_admin = user.portal_role() == Some(Role::Admin);
    let is_same_doctor = user.portal_role() == Some(Role::Doctor) && user.id == doctor_id.to_string();

    if !is_admin && !is_same_doctor {
        warn!("User {} attempted to edit availability of doctor {}", user.id, doctor_id);
        return Err(AppError::Forbidden("Not authorized to edit this doctor's availability".to_string()));
    }

    let saved = service.set_day(request.into_availability(doctor_id, day)).await?;

    Ok(Json(json!({
        "success": true,
        "availability": saved,
    })))
}
