// libs/appointment-cell/tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::models::CreateAppointmentRequest;
use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, AvailabilityProjector, BroadcastNotifier, DoctorLocks,
    InMemoryAppointmentStore,
};
use doctor_cell::models::{CreateWindowRequest, Doctor};
use doctor_cell::services::{AvailabilityStore, InMemoryAvailabilityStore, SlotGenerator};

/// The first Monday strictly after today.
pub fn next_monday() -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != Weekday::Mon {
        date += Duration::days(1);
    }
    date
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, minute, 0).unwrap().and_utc()
}

pub struct Harness {
    pub availability: Arc<InMemoryAvailabilityStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub booking: Arc<AppointmentBookingService>,
    pub projector: Arc<AvailabilityProjector>,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub monday: NaiveDate,
}

impl Harness {
    /// One doctor available Mondays 09:00-12:00.
    pub async fn new() -> Self {
        let availability = Arc::new(InMemoryAvailabilityStore::new());
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let notifier = Arc::new(BroadcastNotifier::default());
        let doctor_id = Uuid::new_v4();

        availability
            .add_doctor(Doctor {
                id: doctor_id,
                full_name: "Dr. Sarah Smith".to_string(),
                specialty: "CARDIOLOGIST".to_string(),
            })
            .await
            .unwrap();
        availability
            .add_window(doctor_id, CreateWindowRequest {
                day_of_week: 1,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        let booking = Arc::new(booking_service(availability.clone(), appointments.clone(), notifier.clone()));
        let projector = Arc::new(AvailabilityProjector::new(
            availability.clone(),
            appointments.clone(),
            SlotGenerator::default(),
        ));

        Self {
            availability,
            appointments,
            notifier,
            booking,
            projector,
            doctor_id,
            patient_id: Uuid::new_v4(),
            monday: next_monday(),
        }
    }

    pub fn request(&self, start: (u32, u32), end: (u32, u32)) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            start_time: at(self.monday, start.0, start.1),
            end_time: at(self.monday, end.0, end.1),
            notes: None,
        }
    }

    pub fn request_for(&self, patient_id: Uuid, start: (u32, u32), end: (u32, u32)) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id,
            ..self.request(start, end)
        }
    }
}

pub fn booking_service(
    availability: Arc<InMemoryAvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    notifier: Arc<BroadcastNotifier>,
) -> AppointmentBookingService {
    AppointmentBookingService::new(
        appointments,
        availability,
        notifier,
        DoctorLocks::new(StdDuration::from_secs(5)),
    )
}
