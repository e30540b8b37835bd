// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use tracing::{info, warn};

use doctor_cell::{AvailabilityService, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;
use shared_utils::{Clock, SystemClock};

use crate::services::{
    AppointmentBookingService, AppointmentLifecycleService, AvailabilityQueryService, BookingLedger,
    IdentityDirectory, InMemoryDirectory, InMemoryLedger, SlotLockRegistry, SupabaseDirectory, SupabaseLedger,
};

/// Everything the scheduling routes share. Built once at startup so the
/// ledger and the slot locks are common to every request.
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub availability: Arc<AvailabilityService>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub query: AvailabilityQueryService,
    pub booking: AppointmentBookingService,
    pub lifecycle: AppointmentLifecycleService,
}

impl SchedulingState {
    pub fn new(
        config: Arc<AppConfig>,
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        directory: Arc<dyn IdentityDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(SlotLockRegistry::new());

        Self {
            query: AvailabilityQueryService::new(Arc::clone(&availability), Arc::clone(&ledger), Arc::clone(&clock)),
            booking: AppointmentBookingService::new(
                Arc::clone(&availability),
                Arc::clone(&ledger),
                Arc::clone(&directory),
                Arc::clone(&locks),
                Arc::clone(&clock),
                config.booking_timeout(),
            ),
            lifecycle: AppointmentLifecycleService::new(ledger, locks, clock),
            config,
            availability,
            directory,
        }
    }

    /// Wire the configured storage backend with the system clock.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        match config.storage_backend {
            StorageBackend::Supabase => {
                if !config.is_configured() {
                    warn!("Supabase backend selected but SUPABASE_URL or keys are missing");
                }
                info!("Scheduling state backed by Supabase at {}", config.supabase_url);
                let supabase = Arc::new(SupabaseClient::new(&config));
                let availability = Arc::new(AvailabilityService::new(Arc::new(
                    SupabaseAvailabilityRepository::new(Arc::clone(&supabase)),
                )));
                let ledger = Arc::new(SupabaseLedger::new(Arc::clone(&supabase)));
                let directory = Arc::new(SupabaseDirectory::new(supabase));
                Self::new(config, availability, ledger, directory, clock)
            }
            StorageBackend::Memory => {
                info!("Scheduling state kept in memory");
                let availability = Arc::new(AvailabilityService::new(Arc::new(InMemoryAvailabilityRepository::new())));
                let directory = Arc::new(InMemoryDirectory::with_availability(Arc::clone(&availability)));
                Self::new(config, availability, Arc::new(InMemoryLedger::new()), directory, clock)
            }
        }
    }
}
