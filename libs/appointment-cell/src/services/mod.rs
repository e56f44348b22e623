pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod locks;
pub mod notifier;
pub mod projector;
pub mod store;
pub mod supabase_store;

pub use booking::AppointmentBookingService;
pub use conflict::{first_conflict, ConflictResolver};
pub use lifecycle::AppointmentLifecycleService;
pub use locks::DoctorLocks;
pub use notifier::{BroadcastNotifier, Notifier, SupabaseNotifier, TracingNotifier};
pub use projector::{day_bounds, AvailabilityProjector};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase_store::SupabaseAppointmentStore;
