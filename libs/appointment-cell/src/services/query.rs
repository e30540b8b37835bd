// libs/appointment-cell/src/services/query.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, instrument};
use uuid::Uuid;

use doctor_cell::{AvailabilityService, SlotTime};
use shared_utils::Clock;

use crate::models::AppointmentError;
use crate::services::ledger::BookingLedger;

/// Read side of the schedule: which slots can still be booked.
pub struct AvailabilityQueryService {
    availability: Arc<AvailabilityService>,
    ledger: Arc<dyn BookingLedger>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityQueryService {
    pub fn new(
        availability: Arc<AvailabilityService>,
        ledger: Arc<dyn BookingLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { availability, ledger, clock }
    }

    /// Slots on the doctor's grid for `date` not held by a scheduled
    /// appointment, ascending. Dates before today have no free slots.
    #[instrument(skip(self))]
    pub async fn free_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<SlotTime>, AppointmentError> {
        if date < self.clock.today() {
            debug!("Free slots requested for past date {}", date);
            return Ok(Vec::new());
        }

        let grid = self.availability.slot_grid(doctor_id, date).await?;
        if grid.is_empty() {
            return Ok(Vec::new());
        }

        let taken = self.ledger.scheduled_slots(doctor_id, date).await?;
        let free: Vec<SlotTime> = grid.slots().filter(|slot| !taken.contains(slot)).collect();

        debug!("{} of {} slots free for doctor {} on {}", free.len(), grid.len(), doctor_id, date);
        Ok(free)
    }
}
