// libs/appointment-cell/tests/store_failure_test.rs

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::anyhow;
use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_test::assert_err;
use mockall::mock;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentQuery, AppointmentStatus, LifecycleEvent,
    UpdateAppointmentRequest,
};
use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, DoctorLocks, InMemoryAppointmentStore, Notifier,
};
use shared_database::StoreError;
use shared_models::auth::AuthContext;

use common::{at, Harness};

mock! {
    pub Appointments {}

    #[async_trait]
    impl AppointmentStore for Appointments {
        async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
        async fn find_overlapping(
            &self,
            doctor_id: Uuid,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            statuses: &[AppointmentStatus],
            exclude_id: Option<Uuid>,
        ) -> Result<Vec<Appointment>, StoreError>;
        async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;
        async fn update_status(&self, id: Uuid, from: AppointmentStatus, to: AppointmentStatus) -> Result<Appointment, StoreError>;
        async fn update_details(&self, id: Uuid, changes: AppointmentChanges) -> Result<Appointment, StoreError>;
        async fn search(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        Err(anyhow!("notification backend down"))
    }
}

fn service_over(harness: &Harness, store: MockAppointments) -> AppointmentBookingService {
    AppointmentBookingService::new(
        Arc::new(store),
        harness.availability.clone(),
        harness.notifier.clone(),
        DoctorLocks::new(StdDuration::from_secs(1)),
    )
}

#[tokio::test]
async fn query_failure_surfaces_as_store_failure() {
    let h = Harness::new().await;
    let mut store = MockAppointments::new();
    store
        .expect_find_overlapping()
        .returning(|_, _, _, _, _| Err(StoreError::Backend("connection reset".to_string())));
    store.expect_insert().never();

    let booking = service_over(&h, store);
    let result = booking
        .create_appointment(&AuthContext::patient(h.patient_id), h.request((9, 0), (9, 30)))
        .await;

    assert_matches!(result, Err(AppointmentError::StoreFailure(_)));
}

#[tokio::test]
async fn insert_constraint_violation_is_slot_unavailable() {
    let h = Harness::new().await;
    let mut store = MockAppointments::new();
    store.expect_find_overlapping().returning(|_, _, _, _, _| Ok(vec![]));
    store
        .expect_insert()
        .times(1)
        .returning(|_| Err(StoreError::Conflict("appointments_no_overlap".to_string())));

    let booking = service_over(&h, store);
    let result = booking
        .create_appointment(&AuthContext::patient(h.patient_id), h.request((9, 0), (9, 30)))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn cancel_landing_before_reschedule_write_is_invalid_transition() {
    let h = Harness::new().await;
    let booked = Appointment {
        id: Uuid::new_v4(),
        doctor_id: h.doctor_id,
        patient_id: h.patient_id,
        start_time: at(h.monday, 9, 0),
        end_time: at(h.monday, 9, 30),
        status: AppointmentStatus::Requested,
        notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let cancelled = Appointment {
        status: AppointmentStatus::Cancelled,
        ..booked.clone()
    };

    let mut store = MockAppointments::new();
    // Initial load and the re-check under the doctor lock still see REQUESTED.
    store.expect_get().times(2).returning(move |_| Ok(Some(booked.clone())));
    store.expect_get().returning(move |_| Ok(Some(cancelled.clone())));
    store.expect_find_overlapping().returning(|_, _, _, _, _| Ok(vec![]));
    store
        .expect_update_details()
        .times(1)
        .withf(|_, changes| changes.moves_times())
        .returning(|id, _| Err(StoreError::Conflict(format!("Appointment {} is CANCELLED and cannot be moved", id))));

    let mut events = h.notifier.subscribe();
    let booking = service_over(&h, store);
    let result = booking
        .update_appointment(&AuthContext::patient(h.patient_id), Uuid::new_v4(), UpdateAppointmentRequest {
            start_time: Some(at(h.monday, 11, 0)),
            end_time: Some(at(h.monday, 11, 30)),
            notes: None,
        })
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidTransition { from: AppointmentStatus::Cancelled, .. })
    );
    assert_err!(events.try_recv());
}

#[tokio::test]
async fn listing_failure_surfaces_as_store_failure() {
    let h = Harness::new().await;
    let mut store = MockAppointments::new();
    store
        .expect_search()
        .returning(|_| Err(StoreError::Backend("timeout".to_string())));

    let booking = service_over(&h, store);
    let result = booking
        .patient_appointments(&AuthContext::patient(h.patient_id), h.patient_id)
        .await;

    assert_matches!(result, Err(AppointmentError::StoreFailure(_)));
}

#[tokio::test]
async fn notifier_failure_keeps_the_booking() {
    let h = Harness::new().await;
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let booking = AppointmentBookingService::new(
        appointments.clone(),
        h.availability.clone(),
        Arc::new(FailingNotifier),
        DoctorLocks::new(StdDuration::from_secs(1)),
    );

    let created = booking
        .create_appointment(&AuthContext::patient(h.patient_id), h.request((9, 0), (9, 30)))
        .await
        .unwrap();

    assert_eq!(appointments.get(created.id).await.unwrap(), Some(created));
}

#[tokio::test]
async fn held_doctor_lock_times_out_as_store_failure() {
    let h = Harness::new().await;
    let locks = DoctorLocks::new(StdDuration::from_millis(50));
    let _held = locks.acquire(h.doctor_id).await.unwrap();

    // Guard stays held after the lock table moves into the service.
    let booking = AppointmentBookingService::new(
        Arc::new(InMemoryAppointmentStore::new()),
        h.availability.clone(),
        h.notifier.clone(),
        locks,
    );

    let result = booking
        .create_appointment(&AuthContext::patient(h.patient_id), h.request((9, 0), (9, 30)))
        .await;

    assert_matches!(result, Err(AppointmentError::StoreFailure(_)));
}
