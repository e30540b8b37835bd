pub mod handlers;
pub mod router;
pub mod models;
pub mod services;

pub use models::{
    AvailabilityError, DayOfWeek, DoctorAvailability, SlotTime,
    UpsertAvailabilityRequest, WeeklyAvailability,
};
pub use router::doctor_routes;
pub use services::{
    AvailabilityRepository, AvailabilityService, InMemoryAvailabilityRepository,
    SlotGenerator, Slots, SupabaseAvailabilityRepository, SLOT_MINUTES,
};
