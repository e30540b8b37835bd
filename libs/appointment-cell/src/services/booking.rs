// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::AvailabilityService;
use shared_utils::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentValidationRules, BookAppointmentRequest,
};
use crate::services::consistency::SlotLockRegistry;
use crate::services::directory::IdentityDirectory;
use crate::services::ledger::BookingLedger;

pub struct AppointmentBookingService {
    availability: Arc<AvailabilityService>,
    ledger: Arc<dyn BookingLedger>,
    directory: Arc<dyn IdentityDirectory>,
    locks: Arc<SlotLockRegistry>,
    clock: Arc<dyn Clock>,
    validation_rules: AppointmentValidationRules,
    timeout: Duration,
}

impl AppointmentBookingService {
    pub fn new(
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        directory: Arc<dyn IdentityDirectory>,
        locks: Arc<SlotLockRegistry>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            availability,
            ledger,
            directory,
            locks,
            clock,
            validation_rules: AppointmentValidationRules::default(),
            timeout,
        }
    }

    /// Book a slot. Either a new scheduled appointment is recorded and
    /// returned, or nothing changes. A booking that exceeds the configured
    /// deadline gives `Timeout` and leaves no record behind.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id, date = %request.date, slot = %request.time_slot))]
    pub async fn book(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        match tokio::time::timeout(self.timeout, self.book_inner(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Booking exceeded {:?}", self.timeout);
                Err(AppointmentError::Timeout)
            }
        }
    }

    async fn book_inner(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        let reason = self.validate_request(&request)?;

        if !self.directory.doctor_exists(request.doctor_id).await? {
            return Err(AppointmentError::DoctorNotFound);
        }
        if !self.directory.patient_exists(request.patient_id).await? {
            return Err(AppointmentError::PatientNotFound);
        }

        let grid = self.availability.slot_grid(request.doctor_id, request.date).await?;
        if !grid.contains(request.time_slot) {
            return Err(AppointmentError::InvalidRequest(format!(
                "{} is not a bookable slot for this doctor on {}",
                request.time_slot, request.date
            )));
        }

        let key = request.slot_key();
        let _guard = self.locks.acquire(key).await;

        if self.ledger.is_scheduled(&key).await? {
            info!("Slot {} already booked", key);
            return Err(AppointmentError::SlotUnavailable);
        }

        let now = self.clock.now_utc();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            date: request.date,
            time_slot: request.time_slot,
            status: AppointmentStatus::Scheduled,
            reason_for_visit: reason,
            created_at: now,
            updated_at: now,
        };

        match self.ledger.insert_scheduled(appointment).await {
            Ok(saved) => {
                info!("Appointment {} booked for patient {}", saved.id, saved.patient_id);
                Ok(saved)
            }
            Err(AppointmentError::SlotUnavailable) => {
                info!("Slot {} taken by a concurrent booking", key);
                Err(AppointmentError::SlotUnavailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns the trimmed reason on success.
    fn validate_request(&self, request: &BookAppointmentRequest) -> Result<String, AppointmentError> {
        let reason = request.reason_for_visit.trim();
        let length = reason.chars().count();
        let rules = &self.validation_rules;

        if length < rules.min_reason_length || length > rules.max_reason_length {
            debug!("Rejected reason of {} characters", length);
            return Err(AppointmentError::InvalidRequest(format!(
                "Reason for visit must be between {} and {} characters",
                rules.min_reason_length, rules.max_reason_length
            )));
        }

        if request.date < self.clock.today() {
            return Err(AppointmentError::InvalidRequest(
                "Cannot book appointments in the past".to_string(),
            ));
        }

        Ok(reason.to_string())
    }
}
