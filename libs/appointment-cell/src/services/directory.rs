// libs/appointment-cell/src/services/directory.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use doctor_cell::AvailabilityService;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::Role;

use crate::models::{Actor, AppointmentError};

/// Answers whether a doctor or patient id refers to a known person.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError>;
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError>;

    /// Called with each authenticated caller; a no-op unless the directory
    /// keeps its own records.
    async fn enroll(&self, _actor: &Actor) {}
}

/// Development directory. Authenticated doctors and patients enroll
/// themselves; a doctor with a weekly template also counts as known.
#[derive(Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashSet<Uuid>>,
    patients: RwLock<HashSet<Uuid>>,
    availability: Option<Arc<AvailabilityService>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_availability(availability: Arc<AvailabilityService>) -> Self {
        Self {
            availability: Some(availability),
            ..Self::default()
        }
    }

    pub async fn register_doctor(&self, doctor_id: Uuid) {
        self.doctors.write().await.insert(doctor_id);
    }

    pub async fn register_patient(&self, patient_id: Uuid) {
        self.patients.write().await.insert(patient_id);
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        if self.doctors.read().await.contains(&doctor_id) {
            return Ok(true);
        }
        match &self.availability {
            Some(availability) => Ok(!availability.get_weekly_template(doctor_id).await?.days.is_empty()),
            None => Ok(false),
        }
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError> {
        Ok(self.patients.read().await.contains(&patient_id))
    }

    async fn enroll(&self, actor: &Actor) {
        match actor.role {
            Role::Doctor => self.register_doctor(actor.user_id).await,
            Role::Patient => self.register_patient(actor.user_id).await,
            Role::Admin => {}
        }
    }
}

/// Looks people up in the `doctors` and `patients` tables.
pub struct SupabaseDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn exists(&self, table: &str, id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!("/rest/v1/{}?id=eq.{}&select=id", table, id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl IdentityDirectory for SupabaseDirectory {
    async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool, AppointmentError> {
        self.exists("doctors", doctor_id).await
    }

    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, AppointmentError> {
        self.exists("patients", patient_id).await
    }
}
