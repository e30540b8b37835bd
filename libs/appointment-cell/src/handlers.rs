// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::{ApiJson, ApiPath, ApiQuery};

use crate::models::{
    Actor, Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, DateQuery,
    FreeSlotsResponse, TransitionRequest,
};
use crate::services::AppointmentLifecycleService;
use crate::state::SchedulingState;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AppointmentError::SlotUnavailable => AppError::Unavailable(err.to_string()),
            AppointmentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::DoctorNotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Forbidden => AppError::Forbidden(err.to_string()),
            AppointmentError::Timeout => AppError::ServiceUnavailable(err.to_string()),
            AppointmentError::Storage(msg) => AppError::Database(msg),
        }
    }
}

/// An appointment as returned over HTTP, with the statuses it may move to.
#[derive(Debug, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub allowed_transitions: &'static [AppointmentStatus],
}

#[derive(Debug, Serialize)]
pub struct ScheduleEntry {
    #[serde(flatten)]
    pub view: AppointmentView,
    pub past_due: bool,
}

impl From<Appointment> for AppointmentView {
    fn from(appointment: Appointment) -> Self {
        Self {
            allowed_transitions: AppointmentLifecycleService::valid_transitions(appointment.status),
            appointment,
        }
    }
}

async fn actor_for(state: &SchedulingState, user: &User) -> Result<Actor, AppError> {
    let actor = Actor::from_user(user)?;
    state.directory.enroll(&actor).await;
    Ok(actor)
}

#[axum::debug_handler]
pub async fn free_slots(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    ApiPath(doctor_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<FreeSlotsResponse>, AppError> {
    actor_for(&state, &user).await?;

    let slots = state.query.free_slots(doctor_id, query.date).await?;

    Ok(Json(FreeSlotsResponse {
        doctor_id,
        date: query.date,
        slots,
    }))
}

/// Patients book for themselves; staff may book on behalf of any patient.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    ApiJson(request): ApiJson<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<AppointmentView>), AppError> {
    let actor = actor_for(&state, &user).await?;

    if !actor.is_staff() && actor.user_id != request.patient_id {
        warn!("Patient {} attempted to book for {}", actor.user_id, request.patient_id);
        return Err(AppError::Forbidden("Not authorized to book for this patient".to_string()));
    }

    let appointment = state.booking.book(request).await?;

    Ok((StatusCode::CREATED, Json(AppointmentView::from(appointment))))
}

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    ApiPath(appointment_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<TransitionRequest>,
) -> Result<Json<AppointmentView>, AppError> {
    let actor = actor_for(&state, &user).await?;

    let updated = state.lifecycle.transition(appointment_id, request.status, &actor).await?;

    Ok(Json(AppointmentView::from(updated)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    ApiPath(appointment_id): ApiPath<Uuid>,
) -> Result<Json<AppointmentView>, AppError> {
    let actor = actor_for(&state, &user).await?;
    let appointment = state.lifecycle.get(appointment_id).await?;

    let visible = actor.acts_for_doctor(appointment.doctor_id)
        || (actor.role == Role::Patient && actor.user_id == appointment.patient_id);
    if !visible {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(AppointmentView::from(appointment)))
}

/// Day view for staff, with a `past_due` flag on appointments still
/// scheduled after their slot has ended.
#[axum::debug_handler]
pub async fn doctor_schedule(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    ApiPath(doctor_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&state, &user).await?;
    if !actor.is_staff() {
        return Err(AppError::Forbidden("Only staff can view a doctor's schedule".to_string()));
    }

    let appointments = state.lifecycle.list_for_doctor_on(doctor_id, query.date).await?;
    let entries: Vec<ScheduleEntry> = appointments
        .into_iter()
        .map(|appointment| ScheduleEntry {
            past_due: state.lifecycle.past_due_now(&appointment),
            view: AppointmentView::from(appointment),
        })
        .collect();

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "appointments": entries,
    })))
}
