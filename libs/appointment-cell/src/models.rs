// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::{AvailabilityError, SlotTime};
use shared_database::DatabaseError;
use shared_models::auth::{Role, User};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: SlotTime,
    pub status: AppointmentStatus,
    pub reason_for_visit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The (doctor, date, slot) key this appointment occupies while scheduled.
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date,
            time_slot: self.time_slot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Missed => "missed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "missed" => Ok(AppointmentStatus::Missed),
            other => Err(AppointmentError::InvalidRequest(format!("Unknown appointment status '{}'", other))),
        }
    }
}

/// Identity of one bookable slot. At most one scheduled appointment may hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: SlotTime,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot_{}_{}_{}", self.doctor_id, self.date, self.time_slot)
    }
}

/// Authenticated caller acting on the schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn patient(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Patient }
    }

    pub fn doctor(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Doctor }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Admin }
    }

    pub fn from_user(user: &User) -> Result<Self, AppointmentError> {
        let user_id = Uuid::parse_str(&user.id).map_err(|_| AppointmentError::Forbidden)?;
        let role = user.portal_role().ok_or(AppointmentError::Forbidden)?;
        Ok(Self { user_id, role })
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Admins act for every doctor; a doctor only for their own calendar.
    pub fn acts_for_doctor(&self, doctor_id: Uuid) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Doctor => self.user_id == doctor_id,
            Role::Patient => false,
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: SlotTime,
    pub reason_for_visit: String,
}

impl BookAppointmentRequest {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.date,
            time_slot: self.time_slot,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotTime>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Appointment slot not available")]
    SlotUnavailable,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Appointment not found")]
    NotFound,

    #[error("Not permitted to act on this appointment")]
    Forbidden,

    #[error("Booking did not complete in time")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(_) => AppointmentError::SlotUnavailable,
            other => AppointmentError::Storage(other.to_string()),
        }
    }
}

impl From<AvailabilityError> for AppointmentError {
    fn from(err: AvailabilityError) -> Self {
        AppointmentError::Storage(err.to_string())
    }
}

// ==============================================================================
// VALIDATION MODELS
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AppointmentValidationRules {
    pub min_reason_length: usize,
    pub max_reason_length: usize,
}

impl Default for AppointmentValidationRules {
    fn default() -> Self {
        Self {
            min_reason_length: 5,
            max_reason_length: 500,
        }
    }
}
