// libs/appointment-cell/src/services/ledger.rs
//
// The booking ledger: every appointment ever made, plus an index of which
// slot keys are currently held by a scheduled appointment.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::SlotTime;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, SlotKey};

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Slots of `doctor_id` on `date` held by scheduled appointments.
    async fn scheduled_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<SlotTime>, AppointmentError>;

    async fn is_scheduled(&self, key: &SlotKey) -> Result<bool, AppointmentError> {
        let slots = self.scheduled_slots(key.doctor_id, key.date).await?;
        Ok(slots.contains(&key.time_slot))
    }

    /// Atomically insert a scheduled appointment unless its slot key is
    /// already held, in which case `SlotUnavailable` is returned and nothing
    /// is written.
    async fn insert_scheduled(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Compare-and-set the status. Returns `None` when the appointment does not
    /// exist or is no longer in `from`.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Every appointment of a doctor on a date, any status, ordered by slot.
    async fn list_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY LEDGER
// ==============================================================================

#[derive(Default)]
struct LedgerState {
    appointments: HashMap<Uuid, Appointment>,
    scheduled: HashMap<SlotKey, Uuid>,
}

/// Process-local ledger. Each write is a single critical section with no
/// await inside it, so a cancelled caller can never leave half a record.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingLedger for InMemoryLedger {
    async fn scheduled_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<SlotTime>, AppointmentError> {
        let state = self.state.read().await;
        Ok(state
            .scheduled
            .keys()
            .filter(|key| key.doctor_id == doctor_id && key.date == date)
            .map(|key| key.time_slot)
            .collect())
    }

    async fn is_scheduled(&self, key: &SlotKey) -> Result<bool, AppointmentError> {
        Ok(self.state.read().await.scheduled.contains_key(key))
    }

    async fn insert_scheduled(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::InvalidRequest(
                "Only scheduled appointments can be booked".to_string(),
            ));
        }

        let key = appointment.slot_key();
        let mut state = self.state.write().await;

        if state.scheduled.contains_key(&key) {
            return Err(AppointmentError::SlotUnavailable);
        }

        state.scheduled.insert(key, appointment.id);
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.state.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if to == AppointmentStatus::Scheduled {
            return Err(AppointmentError::InvalidTransition { from, to });
        }

        let mut state = self.state.write().await;

        let key = match state.appointments.get(&appointment_id) {
            Some(current) if current.status == from => current.slot_key(),
            _ => return Ok(None),
        };

        if from == AppointmentStatus::Scheduled
            && state.scheduled.get(&key) == Some(&appointment_id)
        {
            state.scheduled.remove(&key);
        }

        let updated = state.appointments.get_mut(&appointment_id).map(|appointment| {
            appointment.status = to;
            appointment.updated_at = at;
            appointment.clone()
        });
        Ok(updated)
    }

    async fn list_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|appointment| appointment.doctor_id == doctor_id && appointment.date == date)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.time_slot.cmp(&b.time_slot).then(a.created_at.cmp(&b.created_at)));
        Ok(found)
    }
}

// ==============================================================================
// SUPABASE LEDGER
// ==============================================================================

/// Ledger backed by the `appointments` table. The table carries a partial
/// unique index on `(doctor_id, date, time_slot) where status = 'scheduled'`;
/// PostgREST reports a violation as HTTP 409, which surfaces here as
/// `SlotUnavailable`.
pub struct SupabaseLedger {
    supabase: Arc<SupabaseClient>,
}

#[derive(Deserialize)]
struct SlotRow {
    time_slot: SlotTime,
}

impl SupabaseLedger {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppointmentError::Storage(format!("Malformed appointment row: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl BookingLedger for SupabaseLedger {
    async fn scheduled_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<SlotTime>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=eq.scheduled&select=time_slot",
            doctor_id, date
        );
        let rows: Vec<SlotRow> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(rows.into_iter().map(|row| row.time_slot).collect())
    }

    async fn insert_scheduled(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Storage(e.to_string()))?;

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    debug!("Unique slot constraint rejected appointment {}", appointment.id);
                }
                AppointmentError::from(e)
            })?;

        Self::parse_appointments(rows)?
            .pop()
            .ok_or_else(|| AppointmentError::Storage("Appointment insert returned no row".to_string()))
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(Self::parse_appointments(rows)?.pop())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if to == AppointmentStatus::Scheduled {
            return Err(AppointmentError::InvalidTransition { from, to });
        }

        // The status filter turns the PATCH into a compare-and-set.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", appointment_id, from);
        let body = json!({
            "status": to,
            "updated_at": at.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        let mut updated = Self::parse_appointments(rows)?;
        if updated.len() > 1 {
            warn!("Status update for {} touched {} rows", appointment_id, updated.len());
        }
        Ok(updated.pop())
    }

    async fn list_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&order=time_slot.asc,created_at.asc",
            doctor_id, date
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Self::parse_appointments(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appointment(doctor_id: Uuid, slot: &str) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time_slot: slot.parse().unwrap(),
            status: AppointmentStatus::Scheduled,
            reason_for_visit: "Annual check-up".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_second_scheduled_for_same_key() {
        let ledger = InMemoryLedger::new();
        let doctor_id = Uuid::new_v4();

        ledger.insert_scheduled(appointment(doctor_id, "09:00")).await.unwrap();
        let second = ledger.insert_scheduled(appointment(doctor_id, "09:00")).await;

        assert_eq!(second, Err(AppointmentError::SlotUnavailable));
        assert_eq!(ledger.list_for_doctor_on(doctor_id, appointment(doctor_id, "09:00").date).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_releases_key_but_keeps_history() {
        let ledger = InMemoryLedger::new();
        let doctor_id = Uuid::new_v4();
        let first = ledger.insert_scheduled(appointment(doctor_id, "10:00")).await.unwrap();

        let cancelled = ledger
            .update_status(first.id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert!(!ledger.is_scheduled(&first.slot_key()).await.unwrap());

        ledger.insert_scheduled(appointment(doctor_id, "10:00")).await.unwrap();
        let history = ledger.list_for_doctor_on(doctor_id, first.date).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, AppointmentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_update_status_is_compare_and_set() {
        let ledger = InMemoryLedger::new();
        let booked = ledger.insert_scheduled(appointment(Uuid::new_v4(), "11:00")).await.unwrap();

        ledger
            .update_status(booked.id, AppointmentStatus::Scheduled, AppointmentStatus::Completed, Utc::now())
            .await
            .unwrap();

        let stale = ledger
            .update_status(booked.id, AppointmentStatus::Scheduled, AppointmentStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(ledger.get(booked.id).await.unwrap().unwrap().status, AppointmentStatus::Completed);

        let missing = ledger
            .update_status(Uuid::new_v4(), AppointmentStatus::Scheduled, AppointmentStatus::Missed, Utc::now())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_scheduled_slots_ignore_other_doctors_and_dates() {
        let ledger = InMemoryLedger::new();
        let doctor_id = Uuid::new_v4();

        ledger.insert_scheduled(appointment(doctor_id, "09:00")).await.unwrap();
        ledger.insert_scheduled(appointment(Uuid::new_v4(), "09:30")).await.unwrap();
        let mut next_day = appointment(doctor_id, "10:00");
        next_day.date = next_day.date.succ_opt().unwrap();
        ledger.insert_scheduled(next_day).await.unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let slots: Vec<String> = ledger
            .scheduled_slots(doctor_id, date)
            .await
            .unwrap()
            .into_iter()
            .map(|slot| slot.to_string())
            .collect();
        assert_eq!(slots, vec!["09:00"]);
    }
}
