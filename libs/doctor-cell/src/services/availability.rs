// libs/doctor-cell/src/services/availability.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{AvailabilityError, DayOfWeek, DoctorAvailability, WeeklyAvailability};
use crate::services::slots::SlotGenerator;

/// Storage for doctors' weekly templates. Writes replace the record for the
/// same (doctor, day), so a doctor never has two records for one weekday.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, AvailabilityError>;

    async fn find_for_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Option<DoctorAvailability>, AvailabilityError>;

    async fn upsert(&self, availability: DoctorAvailability) -> Result<DoctorAvailability, AvailabilityError>;
}

// ==============================================================================
// IN-MEMORY REPOSITORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    records: RwLock<HashMap<(Uuid, DayOfWeek), DoctorAvailability>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        let records = self.records.read().await;
        let mut found: Vec<DoctorAvailability> = records
            .values()
            .filter(|record| record.doctor_id == doctor_id)
            .cloned()
            .collect();
        found.sort_by_key(|record| record.day);
        Ok(found)
    }

    async fn find_for_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Option<DoctorAvailability>, AvailabilityError> {
        Ok(self.records.read().await.get(&(doctor_id, day)).cloned())
    }

    async fn upsert(&self, availability: DoctorAvailability) -> Result<DoctorAvailability, AvailabilityError> {
        let key = (availability.doctor_id, availability.day);
        self.records.write().await.insert(key, availability.clone());
        Ok(availability)
    }
}

// ==============================================================================
// SUPABASE REPOSITORY
// ==============================================================================

/// Reads and writes the `doctor_availability` table, which carries a unique
/// constraint on `(doctor_id, day)`.
pub struct SupabaseAvailabilityRepository {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAvailabilityRepository {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AvailabilityError::Storage(format!("Malformed availability row: {}", e)))
            })
            .collect()
    }
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        debug!("Fetching availability template for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_availability?doctor_id=eq.{}", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        let mut records = Self::parse_rows(rows)?;
        records.sort_by_key(|record| record.day);
        Ok(records)
    }

    async fn find_for_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Option<DoctorAvailability>, AvailabilityError> {
        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day=eq.{}",
            doctor_id, day
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        let mut records = Self::parse_rows(rows)?;
        if records.len() > 1 {
            return Err(AvailabilityError::DuplicateDay(day));
        }
        Ok(records.pop())
    }

    async fn upsert(&self, availability: DoctorAvailability) -> Result<DoctorAvailability, AvailabilityError> {
        let body = json!({
            "doctor_id": availability.doctor_id,
            "day": availability.day,
            "start_time": availability.start_time,
            "end_time": availability.end_time,
            "is_open": availability.is_open,
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_availability?on_conflict=doctor_id,day",
                None,
                Some(body),
                Some(headers),
            )
            .await?;

        Self::parse_rows(rows)?
            .pop()
            .ok_or_else(|| AvailabilityError::Storage("Availability upsert returned no row".to_string()))
    }
}

// ==============================================================================
// SERVICE
// ==============================================================================

/// Read side used by scheduling, write side used by staff maintaining hours.
pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
}

impl AvailabilityService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_weekly_template(&self, doctor_id: Uuid) -> Result<WeeklyAvailability, AvailabilityError> {
        let records = self.repository.list_for_doctor(doctor_id).await?;
        WeeklyAvailability::from_records(doctor_id, records)
    }

    pub async fn get_for_day(
        &self,
        doctor_id: Uuid,
        day: DayOfWeek,
    ) -> Result<Option<DoctorAvailability>, AvailabilityError> {
        self.repository.find_for_day(doctor_id, day).await
    }

    /// The slot grid a doctor offers on `date`, before any bookings are removed.
    pub async fn slot_grid(&self, doctor_id: Uuid, date: NaiveDate) -> Result<SlotGenerator, AvailabilityError> {
        let availability = self.get_for_day(doctor_id, DayOfWeek::of(date)).await?;
        Ok(SlotGenerator::for_availability(availability.as_ref()))
    }

    /// Replace one weekday of a doctor's template. Existing appointments are
    /// left alone even if they now fall outside the new hours.
    pub async fn set_day(&self, availability: DoctorAvailability) -> Result<DoctorAvailability, AvailabilityError> {
        availability.validate()?;

        let saved = self.repository.upsert(availability).await?;
        info!(
            "Availability for doctor {} on {} set to {}-{} (open: {})",
            saved.doctor_id, saved.day, saved.start_time, saved.end_time, saved.is_open
        );
        Ok(saved)
    }
}
