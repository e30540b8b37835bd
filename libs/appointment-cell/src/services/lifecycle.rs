// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::SLOT_MINUTES;
use shared_models::auth::Role;
use shared_utils::Clock;

use crate::models::{Actor, Appointment, AppointmentError, AppointmentStatus};
use crate::services::consistency::SlotLockRegistry;
use crate::services::ledger::BookingLedger;

pub struct AppointmentLifecycleService {
    ledger: Arc<dyn BookingLedger>,
    locks: Arc<SlotLockRegistry>,
    clock: Arc<dyn Clock>,
}

impl AppointmentLifecycleService {
    pub fn new(ledger: Arc<dyn BookingLedger>, locks: Arc<SlotLockRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self { ledger, locks, clock }
    }

    /// The transition table. Every status other than `scheduled` is terminal.
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Missed,
            ],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::Missed => &[],
        }
    }

    pub fn validate_status_transition(
        current: AppointmentStatus,
        target: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(current).contains(&target) {
            Ok(())
        } else {
            debug!("Rejected transition {} -> {}", current, target);
            Err(AppointmentError::InvalidTransition { from: current, to: target })
        }
    }

    /// Cancelling is open to the owning patient and to staff; completing or
    /// marking missed is staff only. Staff means an admin or the
    /// appointment's own doctor, the same callers that may read it.
    pub fn authorize(
        appointment: &Appointment,
        target: AppointmentStatus,
        actor: &Actor,
    ) -> Result<(), AppointmentError> {
        let staff = actor.acts_for_doctor(appointment.doctor_id);
        let permitted = match target {
            AppointmentStatus::Cancelled => {
                staff || (actor.role == Role::Patient && actor.user_id == appointment.patient_id)
            }
            AppointmentStatus::Completed | AppointmentStatus::Missed => staff,
            AppointmentStatus::Scheduled => false,
        };

        if permitted {
            Ok(())
        } else {
            Err(AppointmentError::Forbidden)
        }
    }

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    pub async fn list_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.list_for_doctor_on(doctor_id, date).await
    }

    /// Move a scheduled appointment to a terminal status. The status change is
    /// applied as a compare-and-set, so of two racing transitions exactly one
    /// wins and the other sees `InvalidTransition`.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get(appointment_id).await?;

        Self::validate_status_transition(appointment.status, target)?;
        if let Err(e) = Self::authorize(&appointment, target, actor) {
            warn!("{:?} {} may not set appointment {} to {}", actor.role, actor.user_id, appointment_id, target);
            return Err(e);
        }

        let _guard = self.locks.acquire(appointment.slot_key()).await;
        let updated = self
            .ledger
            .update_status(appointment_id, appointment.status, target, self.clock.now_utc())
            .await?;

        match updated {
            Some(updated) => {
                info!("Appointment {} moved {} -> {}", appointment_id, appointment.status, updated.status);
                Ok(updated)
            }
            None => {
                let current = self.get(appointment_id).await?;
                Err(AppointmentError::InvalidTransition { from: current.status, to: target })
            }
        }
    }

    /// Still scheduled, and the slot ended before `now` (facility time).
    pub fn is_past_due(appointment: &Appointment, now: NaiveDateTime) -> bool {
        if appointment.status != AppointmentStatus::Scheduled {
            return false;
        }
        let slot_end = appointment.date.and_time(appointment.time_slot.as_naive())
            + Duration::minutes(i64::from(SLOT_MINUTES));
        slot_end <= now
    }

    pub fn past_due_now(&self, appointment: &Appointment) -> bool {
        Self::is_past_due(appointment, self.clock.local_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn appointment(status: AppointmentStatus, patient_id: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            patient_id,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time_slot: "09:00".parse().unwrap(),
            status,
            reason_for_visit: "Follow-up".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Missed,
    ];

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert_eq!(
                    AppointmentLifecycleService::validate_status_transition(from, to),
                    Err(AppointmentError::InvalidTransition { from, to })
                );
            }
        }
    }

    #[test]
    fn test_scheduled_reaches_exactly_the_terminal_states() {
        let reachable: Vec<AppointmentStatus> = ALL
            .into_iter()
            .filter(|to| AppointmentLifecycleService::validate_status_transition(AppointmentStatus::Scheduled, *to).is_ok())
            .collect();
        assert_eq!(
            reachable,
            vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled, AppointmentStatus::Missed]
        );
    }

    #[test]
    fn test_cancel_permissions() {
        let owner = Uuid::new_v4();
        let booked = appointment(AppointmentStatus::Scheduled, owner);

        assert!(AppointmentLifecycleService::authorize(&booked, AppointmentStatus::Cancelled, &Actor::patient(owner)).is_ok());
        assert!(AppointmentLifecycleService::authorize(&booked, AppointmentStatus::Cancelled, &Actor::doctor(booked.doctor_id)).is_ok());
        assert_eq!(
            AppointmentLifecycleService::authorize(&booked, AppointmentStatus::Cancelled, &Actor::doctor(Uuid::new_v4())),
            Err(AppointmentError::Forbidden)
        );
        assert_eq!(
            AppointmentLifecycleService::authorize(&booked, AppointmentStatus::Cancelled, &Actor::patient(Uuid::new_v4())),
            Err(AppointmentError::Forbidden)
        );
    }

    #[test]
    fn test_only_staff_complete_or_mark_missed() {
        let owner = Uuid::new_v4();
        let booked = appointment(AppointmentStatus::Scheduled, owner);

        for target in [AppointmentStatus::Completed, AppointmentStatus::Missed] {
            assert_eq!(
                AppointmentLifecycleService::authorize(&booked, target, &Actor::patient(owner)),
                Err(AppointmentError::Forbidden)
            );
            assert!(AppointmentLifecycleService::authorize(&booked, target, &Actor::admin(Uuid::new_v4())).is_ok());
            assert!(AppointmentLifecycleService::authorize(&booked, target, &Actor::doctor(booked.doctor_id)).is_ok());
            assert_eq!(
                AppointmentLifecycleService::authorize(&booked, target, &Actor::doctor(Uuid::new_v4())),
                Err(AppointmentError::Forbidden)
            );
        }
    }

    #[test]
    fn test_past_due_after_slot_end() {
        let booked = appointment(AppointmentStatus::Scheduled, Uuid::new_v4());
        let date = booked.date;

        let during = date.and_hms_opt(9, 29, 0).unwrap();
        let at_end = date.and_hms_opt(9, 30, 0).unwrap();
        assert!(!AppointmentLifecycleService::is_past_due(&booked, during));
        assert!(AppointmentLifecycleService::is_past_due(&booked, at_end));

        let cancelled = appointment(AppointmentStatus::Cancelled, Uuid::new_v4());
        assert!(!AppointmentLifecycleService::is_past_due(&cancelled, at_end));
    }
}
