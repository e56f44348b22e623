pub mod availability;
pub mod directory;
pub mod slots;
pub mod supabase_store;

pub use availability::{AvailabilityStore, InMemoryAvailabilityStore};
pub use directory::DoctorDirectory;
pub use slots::SlotGenerator;
pub use supabase_store::SupabaseAvailabilityStore;
