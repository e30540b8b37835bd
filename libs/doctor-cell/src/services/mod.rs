pub mod availability;
pub mod slots;

pub use availability::{
    AvailabilityRepository, AvailabilityService, InMemoryAvailabilityRepository,
    SupabaseAvailabilityRepository,
};
pub use slots::{SlotGenerator, Slots, SLOT_MINUTES};
