use std::sync::Arc;

use tracing::{info, warn};

use appointment_cell::router::AppointmentState;
use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, AvailabilityProjector, DoctorLocks,
    InMemoryAppointmentStore, Notifier, SupabaseAppointmentStore, SupabaseNotifier, TracingNotifier,
};
use doctor_cell::router::DoctorState;
use doctor_cell::services::{
    AvailabilityStore, InMemoryAvailabilityStore, SlotGenerator, SupabaseAvailabilityStore,
};
use shared_config::AppConfig;

pub struct AppStates {
    pub doctor: Arc<DoctorState>,
    pub appointment: Arc<AppointmentState>,
}

/// Builds the per-cell states over one set of stores.
///
/// Without a configured Supabase backend everything runs in memory.
pub fn build(config: Arc<AppConfig>) -> AppStates {
    let (availability, appointments, notifier) = if config.is_configured() {
        info!("Using Supabase stores at {}", config.supabase_url);
        (
            Arc::new(SupabaseAvailabilityStore::new(&config)) as Arc<dyn AvailabilityStore>,
            Arc::new(SupabaseAppointmentStore::new(&config)) as Arc<dyn AppointmentStore>,
            Arc::new(SupabaseNotifier::new(&config)) as Arc<dyn Notifier>,
        )
    } else {
        warn!("Supabase is not configured - using in-memory stores, data will not persist");
        (
            Arc::new(InMemoryAvailabilityStore::new()) as Arc<dyn AvailabilityStore>,
            Arc::new(InMemoryAppointmentStore::new()) as Arc<dyn AppointmentStore>,
            Arc::new(TracingNotifier) as Arc<dyn Notifier>,
        )
    };

    let booking = Arc::new(AppointmentBookingService::new(
        appointments.clone(),
        availability.clone(),
        notifier,
        DoctorLocks::from_config(&config),
    ));
    let projector = Arc::new(AvailabilityProjector::new(
        availability.clone(),
        appointments,
        SlotGenerator::from_config(&config),
    ));

    AppStates {
        doctor: Arc::new(DoctorState::new(config.clone(), availability)),
        appointment: Arc::new(AppointmentState::new(config, booking, projector)),
    }
}
