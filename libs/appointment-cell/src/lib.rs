pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{
    Actor, Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, SlotKey,
};
pub use router::appointment_routes;
pub use services::{
    AppointmentBookingService, AppointmentLifecycleService, AvailabilityQueryService, BookingLedger,
    IdentityDirectory, InMemoryDirectory, InMemoryLedger, SlotLockRegistry, SupabaseDirectory, SupabaseLedger,
};
pub use state::SchedulingState;
