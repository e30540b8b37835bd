pub mod booking;
pub mod consistency;
pub mod directory;
pub mod ledger;
pub mod lifecycle;
pub mod query;

pub use booking::AppointmentBookingService;
pub use consistency::{SlotLockGuard, SlotLockRegistry};
pub use directory::{IdentityDirectory, InMemoryDirectory, SupabaseDirectory};
pub use ledger::{BookingLedger, InMemoryLedger, SupabaseLedger};
pub use lifecycle::AppointmentLifecycleService;
pub use query::AvailabilityQueryService;
